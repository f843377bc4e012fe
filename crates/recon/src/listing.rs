//! Record listings: missing audio or contact details, and ad hoc
//! field=value selections.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::model::{Field, FieldKind, Filter, Level, LegislatorRecord};
use crate::states::is_state;
use crate::store::{pull, pull_any, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTarget {
    Audio,
    Phones,
    Emails,
    Networks,
}

impl MissingTarget {
    pub const ALL: [MissingTarget; 4] = [Self::Audio, Self::Phones, Self::Emails, Self::Networks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Phones => "phones",
            Self::Emails => "emails",
            Self::Networks => "networks",
        }
    }

    /// Columns written when the listing is exported.
    pub fn export_columns(&self) -> &'static [Field] {
        match self {
            Self::Audio => &[Field::Level, Field::State, Field::District, Field::Title, Field::Name, Field::Pronunciation],
            _ => &[Field::Level, Field::State, Field::District, Field::Name],
        }
    }

    fn narrow(&self, filter: &Filter) -> Filter {
        let (field, empty) = match self {
            Self::Audio => (Field::AudioPath, Value::from("")),
            Self::Phones => (Field::Phones, Value::Array(Vec::new())),
            Self::Emails => (Field::Emails, Value::Array(Vec::new())),
            Self::Networks => (Field::Networks, Value::Array(Vec::new())),
        };
        filter.clone().eq(field, empty)
    }
}

impl FromStr for MissingTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown listing '{s}' (expected audio, phones, emails or networks)"))
    }
}

/// Records in scope lacking `target`. An empty filter list means the whole
/// store.
pub fn missing(store: &dyn RecordStore, filters: &[Filter], target: MissingTarget) -> Vec<LegislatorRecord> {
    let scoped: Vec<Filter> = if filters.is_empty() {
        vec![target.narrow(&Filter::new())]
    } else {
        filters.iter().map(|f| target.narrow(f)).collect()
    };
    let records = pull_any(store, &scoped);
    log::info!("{} records missing {}", records.len(), target.as_str());
    records
}

/// Sorted "title name" lines for every record without audio.
pub fn audio_worklist(records: &[LegislatorRecord]) -> Vec<String> {
    let mut lines: Vec<String> = records
        .iter()
        .filter(|r| !r.has_audio())
        .map(|r| format!("{} {}", r.title, r.name))
        .collect();
    lines.sort();
    lines
}

// ---------------------------------------------------------------------------
// Custom selections
// ---------------------------------------------------------------------------

/// Columns for a custom selection.
pub const SELECTION_COLUMNS: &[Field] = &[Field::Level, Field::State, Field::District, Field::Title, Field::Name];

/// Parse one `field=value` condition, typing the value by field kind.
/// An empty district selects at-large seats.
pub fn parse_condition(s: &str) -> Result<(Field, Value), String> {
    let (key, raw) = s.split_once('=').ok_or_else(|| format!("'{s}' is not field=value"))?;
    let field = Field::from_key(key.trim()).ok_or_else(|| format!("unknown field '{}'", key.trim()))?;
    let raw = raw.trim();

    let value = match (field, field.kind()) {
        (Field::Level, _) => match Level::parse(raw) {
            Some(level) => Value::from(level.as_str()),
            None => return Err(format!("unknown level '{raw}'")),
        },
        (Field::State, _) => {
            let code = raw.to_ascii_uppercase();
            if !is_state(&code) {
                return Err(format!("unknown state code '{raw}'"));
            }
            Value::from(code)
        }
        (Field::District, _) if raw.is_empty() => Value::Null,
        (_, FieldKind::Identity | FieldKind::Text) => Value::from(raw),
        (_, FieldKind::Flag) => match raw {
            "true" | "yes" => Value::Bool(true),
            "false" | "no" => Value::Bool(false),
            _ => return Err(format!("{field} takes true or false, not '{raw}'")),
        },
        (_, FieldKind::List | FieldKind::Timestamp) => {
            return Err(format!("{field} cannot be matched by value"));
        }
    };
    Ok((field, value))
}

/// Records satisfying every condition, in store order.
pub fn select(store: &dyn RecordStore, conditions: &[(Field, Value)]) -> Vec<LegislatorRecord> {
    let filter = conditions
        .iter()
        .fold(Filter::new(), |filter, (field, value)| filter.eq_key(field.key(), value.clone()));
    let records = pull(store, &filter);
    log::info!("{} records match {filter}", records.len());
    records
}

/// One row of export cells for `record`, in `columns` order.
pub fn export_row(record: &LegislatorRecord, columns: &[Field]) -> Vec<String> {
    columns
        .iter()
        .map(|field| match record.field_value(*field) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}
