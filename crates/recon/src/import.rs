//! Tabular import: parse, validate, and resolve district / name values.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::ReconError;
use crate::matcher::{IdentityMatch, IdentityMatcher};
use crate::model::{Email, Field, Filter, Level, LegislatorRecord, NetworkLink, Phone, ResolutionOutcome};
use crate::oracle::{ResolutionMode, ResolutionOracle, ResolutionRequest};
use crate::registry::DistrictRegistry;
use crate::states::is_state;
use crate::store::{pull, RecordStore};

/// Separator for multi-valued contact cells.
pub const LIST_SEPARATOR: char = ';';

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Header plus rows, one cell per header column.
#[derive(Debug, Clone, Default)]
pub struct TabularSource {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularSource {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_str(data: &str) -> Result<Self, ReconError> {
        Self::from_delimited_str(data, b',')
    }

    pub fn from_delimited_str(data: &str, delimiter: u8) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ReconError::Io(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }
        Ok(Self { headers, rows })
    }

    /// Map headers onto known fields. `level` and `state` are required.
    pub fn columns(&self) -> Result<Vec<Field>, ReconError> {
        let mut columns = Vec::with_capacity(self.headers.len());
        for header in &self.headers {
            let field = Field::from_key(header)
                .ok_or_else(|| ReconError::Schema(format!("unrecognized column '{header}'")))?;
            if columns.contains(&field) {
                return Err(ReconError::Schema(format!("duplicate column '{header}'")));
            }
            columns.push(field);
        }
        for required in [Field::Level, Field::State] {
            if !columns.contains(&required) {
                return Err(ReconError::Schema(format!("missing column '{required}'")));
            }
        }
        Ok(columns)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Resolve names against the store when the source has no district
    /// column. Turned off when importing people who are not in the store yet.
    pub resolve_names: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { resolve_names: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Correction {
    pub row: usize,
    pub field: Field,
    pub from: String,
    pub to: String,
}

/// A record whose ambiguity the oracle left undecided.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRecord {
    pub row: usize,
    pub field: Field,
    pub record: LegislatorRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportBatch {
    /// Columns the source supplied, in header order.
    pub columns: Vec<Field>,
    pub records: Vec<LegislatorRecord>,
    pub pending: Vec<PendingRecord>,
    pub corrections: Vec<Correction>,
    /// Source rows dropped during resolution.
    pub discarded: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Working {
    row: usize,
    record: LegislatorRecord,
}

enum Verdict {
    Keep,
    Correct(String),
    Discard,
    Pending,
}

/// Parse and validate every row, then resolve non-canonical districts and
/// unknown names. Any bad `level`/`state` aborts the whole import.
pub fn import_records(
    source: &TabularSource,
    registry: &DistrictRegistry,
    store: &dyn RecordStore,
    oracle: &mut dyn ResolutionOracle,
    options: ImportOptions,
) -> Result<ImportBatch, ReconError> {
    let columns = source.columns()?;
    let (mut working, seen) = parse_rows(source, &columns)?;

    let mut batch = ImportBatch {
        columns: columns.clone(),
        records: Vec::new(),
        pending: Vec::new(),
        corrections: Vec::new(),
        discarded: Vec::new(),
    };

    let levels: Vec<Level> = seen[&Field::Level].iter().filter_map(|l| Level::parse(l)).collect();
    let states = &seen[&Field::State];

    if columns.contains(&Field::District) {
        let matcher = IdentityMatcher::correction();
        for level in levels.iter().filter(|l| l.is_district_based()) {
            for state in states {
                let districts = registry.districts_for(*level, state);
                let verdicts = resolve_group(&working, *level, state, Field::District, &districts, matcher, oracle);
                apply_verdicts(&mut working, verdicts, Field::District, &mut batch);
            }
        }
    }

    if options.resolve_names && columns.contains(&Field::Name) && !columns.contains(&Field::District) {
        let matcher = IdentityMatcher::correction();
        for level in &levels {
            for state in states {
                if group_size(&working, *level, state) < 2 {
                    continue;
                }
                let mut names: Vec<String> = Vec::new();
                for record in pull(store, &Filter::scope(*level, state)) {
                    if !names.contains(&record.name) {
                        names.push(record.name);
                    }
                }
                let verdicts = resolve_group(&working, *level, state, Field::Name, &names, matcher, oracle);
                apply_verdicts(&mut working, verdicts, Field::Name, &mut batch);
            }
        }
    }

    batch.records = working
        .into_iter()
        .map(|w| {
            let mut record = w.record;
            if record.district.as_deref().is_some_and(|d| d.trim().is_empty()) {
                record.district = None;
            }
            record
        })
        .collect();

    log::info!(
        "import: {} records, {} corrected, {} discarded, {} pending",
        batch.records.len(),
        batch.corrections.len(),
        batch.discarded.len(),
        batch.pending.len()
    );
    Ok(batch)
}

fn group_size(working: &[Working], level: Level, state: &str) -> usize {
    working.iter().filter(|w| w.record.level == level && w.record.state == state).count()
}

fn field_text(record: &LegislatorRecord, field: Field) -> &str {
    match field {
        Field::District => record.district.as_deref().unwrap_or(""),
        _ => &record.name,
    }
}

fn subject(record: &LegislatorRecord) -> String {
    format!(
        "Name: {} / State: {} / District: {}",
        record.name,
        record.state,
        record.district.as_deref().unwrap_or("NR")
    )
}

/// Decide each member of a (level, state) group with more than one record.
fn resolve_group(
    working: &[Working],
    level: Level,
    state: &str,
    field: Field,
    reference: &[String],
    matcher: IdentityMatcher,
    oracle: &mut dyn ResolutionOracle,
) -> Vec<(usize, Verdict)> {
    let members: Vec<&Working> = working
        .iter()
        .filter(|w| w.record.level == level && w.record.state == state)
        .collect();
    if members.len() < 2 {
        return Vec::new();
    }

    let mut verdicts = Vec::new();
    for member in members {
        let value = field_text(&member.record, field);
        if value.trim().is_empty() || reference.iter().any(|r| r == value) {
            continue;
        }
        let verdict = match matcher.matches(value, reference) {
            IdentityMatch::Unique(resolved) => Verdict::Correct(resolved),
            IdentityMatch::UniqueByDefault => Verdict::Keep,
            IdentityMatch::NoMatch => Verdict::Discard,
            IdentityMatch::Ambiguous(candidates) => {
                let request = ResolutionRequest {
                    subject: subject(&member.record),
                    field,
                    value,
                    candidates: &candidates,
                    mode: ResolutionMode::FieldCorrection,
                };
                match oracle.resolve(&request) {
                    ResolutionOutcome::Accept(chosen) => Verdict::Correct(chosen),
                    ResolutionOutcome::Discard => Verdict::Discard,
                    ResolutionOutcome::Reject => Verdict::Pending,
                }
            }
        };
        verdicts.push((member.row, verdict));
    }
    verdicts
}

fn apply_verdicts(working: &mut Vec<Working>, verdicts: Vec<(usize, Verdict)>, field: Field, batch: &mut ImportBatch) {
    for (row, verdict) in verdicts {
        let Some(pos) = working.iter().position(|w| w.row == row) else {
            continue;
        };
        match verdict {
            Verdict::Keep => {}
            Verdict::Correct(to) => {
                let record = &mut working[pos].record;
                let from = field_text(record, field).to_string();
                log::debug!("row {row}: {field} '{from}' -> '{to}'");
                match field {
                    Field::District => record.district = Some(to.clone()),
                    _ => record.name = to.clone(),
                }
                batch.corrections.push(Correction { row, field, from, to });
            }
            Verdict::Discard => {
                log::debug!("row {row}: discarded on {field}");
                working.remove(pos);
                batch.discarded.push(row);
            }
            Verdict::Pending => {
                let w = working.remove(pos);
                batch.pending.push(PendingRecord { row, field, record: w.record });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

type SeenValues = BTreeMap<Field, Vec<String>>;

fn parse_rows(source: &TabularSource, columns: &[Field]) -> Result<(Vec<Working>, SeenValues), ReconError> {
    let mut seen: SeenValues = columns.iter().map(|c| (*c, Vec::new())).collect();
    let mut working = Vec::with_capacity(source.rows.len());

    for (i, cells) in source.rows.iter().enumerate() {
        let row = i + 1;
        let cell = |field: Field| -> &str {
            columns
                .iter()
                .position(|c| *c == field)
                .and_then(|idx| cells.get(idx))
                .map(|s| s.trim())
                .unwrap_or("")
        };

        let level_str = cell(Field::Level);
        let level = Level::parse(level_str).ok_or_else(|| bad(Field::Level, row))?;
        let state = cell(Field::State);
        if !is_state(state) {
            return Err(bad(Field::State, row));
        }

        let mut record = LegislatorRecord::new(level, state, "");
        for (idx, field) in columns.iter().enumerate() {
            let value = cells.get(idx).map(|s| s.trim()).unwrap_or("");
            if let Some(values) = seen.get_mut(field) {
                if !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
            }
            set_cell(&mut record, *field, value, row)?;
        }
        working.push(Working { row, record });
    }

    Ok((working, seen))
}

fn bad(field: Field, row: usize) -> ReconError {
    ReconError::Validation { field: field.key().to_string(), row }
}

fn set_cell(record: &mut LegislatorRecord, field: Field, value: &str, row: usize) -> Result<(), ReconError> {
    match field {
        Field::Level | Field::State => {}
        Field::District => record.district = Some(value.to_string()),
        Field::Name => record.name = value.to_string(),
        Field::Title => record.title = value.to_string(),
        Field::Country => record.country = (!value.is_empty()).then(|| value.to_string()),
        Field::AudioPath => record.audio_path = value.to_string(),
        Field::PendingAudioPath => record.pending_audio_path = value.to_string(),
        Field::PendingFilename => record.pending_filename = value.to_string(),
        Field::Pronunciation => record.pronunciation = value.to_string(),
        Field::Emails => {
            record.emails = split_list(value).map(|address| Email { address }).collect();
        }
        Field::Phones => {
            record.phones = split_list(value).map(|number| Phone { number }).collect();
        }
        Field::Networks => {
            record.networks = split_list(value).map(|url| NetworkLink { url }).collect();
        }
        Field::Active => {
            if let Some(v) = parse_flag(value, field, row)? {
                record.active = v;
            }
        }
        Field::NeedsAudio => {
            if let Some(v) = parse_flag(value, field, row)? {
                record.needs_audio = v;
            }
        }
        Field::NeedsReview => {
            if let Some(v) = parse_flag(value, field, row)? {
                record.needs_review = v;
            }
        }
        Field::DateAdded => record.date_added = parse_timestamp(value, field, row)?,
        Field::DateModified => record.date_modified = parse_timestamp(value, field, row)?,
    }
    Ok(())
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_flag(value: &str, field: Field, row: usize) -> Result<Option<bool>, ReconError> {
    match value.to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "yes" | "1" => Ok(Some(true)),
        "false" | "no" | "0" => Ok(Some(false)),
        _ => Err(bad(field, row)),
    }
}

fn parse_timestamp(value: &str, field: Field, row: usize) -> Result<Option<DateTime<Utc>>, ReconError> {
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| bad(field, row))
}
