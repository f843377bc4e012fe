use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Jurisdiction tier of a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "fed-upper")]
    FedUpper,
    #[serde(rename = "fed-lower")]
    FedLower,
    #[serde(rename = "state-upper")]
    StateUpper,
    #[serde(rename = "state-lower")]
    StateLower,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::FedUpper, Level::FedLower, Level::StateUpper, Level::StateLower];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FedUpper => "fed-upper",
            Self::FedLower => "fed-lower",
            Self::StateUpper => "state-upper",
            Self::StateLower => "state-lower",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    /// Seats at this level are identified by a district label.
    pub fn is_district_based(&self) -> bool {
        !matches!(self, Self::FedUpper)
    }

    /// Title given to records created for an empty seat.
    pub fn seat_title(&self) -> &'static str {
        match self {
            Self::FedUpper | Self::StateUpper => "Senator",
            Self::FedLower | Self::StateLower => "Representative",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Contact items
// ---------------------------------------------------------------------------

/// Contact entry deduplicated by a natural key.
pub trait NaturalKey {
    fn natural_key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub url: String,
}

impl NaturalKey for Email {
    fn natural_key(&self) -> &str {
        &self.address
    }
}

impl NaturalKey for Phone {
    fn natural_key(&self) -> &str {
        &self.number
    }
}

impl NaturalKey for NetworkLink {
    fn natural_key(&self) -> &str {
        &self.url
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// The known column / document field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Active,
    AudioPath,
    Country,
    DateAdded,
    DateModified,
    District,
    Emails,
    Level,
    Name,
    NeedsAudio,
    NeedsReview,
    Networks,
    PendingAudioPath,
    PendingFilename,
    Phones,
    Pronunciation,
    State,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Seat identity; never overwritten by templates.
    Identity,
    Text,
    List,
    Flag,
    Timestamp,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Active,
        Field::AudioPath,
        Field::Country,
        Field::DateAdded,
        Field::DateModified,
        Field::District,
        Field::Emails,
        Field::Level,
        Field::Name,
        Field::NeedsAudio,
        Field::NeedsReview,
        Field::Networks,
        Field::PendingAudioPath,
        Field::PendingFilename,
        Field::Phones,
        Field::Pronunciation,
        Field::State,
        Field::Title,
    ];

    /// Document key / column header.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::AudioPath => "audioPath",
            Self::Country => "country",
            Self::DateAdded => "dateAdded",
            Self::DateModified => "dateModified",
            Self::District => "district",
            Self::Emails => "emails",
            Self::Level => "level",
            Self::Name => "name",
            Self::NeedsAudio => "needsAudio",
            Self::NeedsReview => "needsReview",
            Self::Networks => "networks",
            Self::PendingAudioPath => "pendingAudioPath",
            Self::PendingFilename => "pendingFilename",
            Self::Phones => "phones",
            Self::Pronunciation => "pronunciation",
            Self::State => "state",
            Self::Title => "title",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Level | Self::State | Self::District | Self::Name | Self::Title => FieldKind::Identity,
            Self::AudioPath
            | Self::Country
            | Self::PendingAudioPath
            | Self::PendingFilename
            | Self::Pronunciation => FieldKind::Text,
            Self::Emails | Self::Phones | Self::Networks => FieldKind::List,
            Self::Active | Self::NeedsAudio | Self::NeedsReview => FieldKind::Flag,
            Self::DateAdded | Self::DateModified => FieldKind::Timestamp,
        }
    }

    /// Fields a template may fill on a new record.
    pub fn is_fillable(&self) -> bool {
        self.kind() != FieldKind::Identity
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// A legislator document as read from or written to a record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegislatorRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub level: Level,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub phones: Vec<Phone>,
    #[serde(default)]
    pub networks: Vec<NetworkLink>,
    #[serde(default)]
    pub audio_path: String,
    #[serde(default)]
    pub pending_audio_path: String,
    #[serde(default)]
    pub pending_filename: String,
    #[serde(default)]
    pub needs_audio: bool,
    #[serde(default)]
    pub needs_review: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<DateTime<Utc>>,
}

impl LegislatorRecord {
    pub fn new(level: Level, state: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            level,
            state: state.into(),
            district: None,
            name: name.into(),
            title: String::new(),
            country: None,
            emails: Vec::new(),
            phones: Vec::new(),
            networks: Vec::new(),
            audio_path: String::new(),
            pending_audio_path: String::new(),
            pending_filename: String::new(),
            needs_audio: false,
            needs_review: false,
            active: true,
            pronunciation: String::new(),
            date_added: None,
            date_modified: None,
        }
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_path.is_empty()
    }

    pub fn scope(&self) -> (Level, &str) {
        (self.level, &self.state)
    }

    /// JSON document form, the shape filters are evaluated against.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_document(doc: Value) -> Result<Self, ReconError> {
        serde_json::from_value(doc).map_err(|e| ReconError::Store(format!("malformed document: {e}")))
    }

    /// Copy one fillable field from `source`. Identity fields are left alone.
    pub fn copy_field_from(&mut self, source: &LegislatorRecord, field: Field) {
        match field {
            Field::Active => self.active = source.active,
            Field::AudioPath => self.audio_path = source.audio_path.clone(),
            Field::Country => self.country = source.country.clone(),
            Field::DateAdded => self.date_added = source.date_added,
            Field::DateModified => self.date_modified = source.date_modified,
            Field::Emails => self.emails = source.emails.clone(),
            Field::NeedsAudio => self.needs_audio = source.needs_audio,
            Field::NeedsReview => self.needs_review = source.needs_review,
            Field::Networks => self.networks = source.networks.clone(),
            Field::PendingAudioPath => self.pending_audio_path = source.pending_audio_path.clone(),
            Field::PendingFilename => self.pending_filename = source.pending_filename.clone(),
            Field::Phones => self.phones = source.phones.clone(),
            Field::Pronunciation => self.pronunciation = source.pronunciation.clone(),
            Field::District | Field::Level | Field::Name | Field::State | Field::Title => {}
        }
    }

    /// Current value of a field in document form (`Null` when absent).
    pub fn field_value(&self, field: Field) -> Value {
        match self.to_document() {
            Value::Object(mut map) => map.remove(field.key()).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Attribute-equality predicate over a document. A `Null` clause matches a
/// missing field. A slice of filters is read as their union.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    pub clauses: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(level: Level, state: &str) -> Self {
        Self::new().eq(Field::Level, level.as_str()).eq(Field::State, state)
    }

    pub fn eq(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.clauses.insert(field.key().to_string(), value.into());
        self
    }

    pub fn eq_key(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches_document(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|(key, expected)| match doc.get(key) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }

    pub fn matches(&self, record: &LegislatorRecord) -> bool {
        self.matches_document(&record.to_document())
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Level × state filters. `states = None` means every state.
pub fn scope_filters(levels: &[Level], states: Option<&[String]>) -> Vec<Filter> {
    match states {
        None => levels
            .iter()
            .map(|l| Filter::new().eq(Field::Level, l.as_str()))
            .collect(),
        Some(states) => states
            .iter()
            .flat_map(|s| levels.iter().map(move |l| Filter::scope(*l, s)))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A reference value scored against the literal being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchCandidate {
    pub value: String,
    pub score: u8,
}

/// What a resolution oracle decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "value")]
pub enum ResolutionOutcome {
    /// A candidate was chosen.
    Accept(String),
    /// Drop the record being resolved.
    Discard,
    /// None of the candidates apply.
    Reject,
}

/// Verdict for one incoming record against the destination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    Accept,
    Skip,
    Flagged(ResolutionOutcome),
}

impl MergeDecision {
    /// Whether the candidate goes on to be inserted.
    ///
    /// A flagged candidate is inserted only when the oracle rejected every
    /// existing record as a match.
    pub fn admits(&self) -> bool {
        match self {
            Self::Accept => true,
            Self::Skip => false,
            Self::Flagged(ResolutionOutcome::Reject) => true,
            Self::Flagged(ResolutionOutcome::Accept(_)) | Self::Flagged(ResolutionOutcome::Discard) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Store write outcome
// ---------------------------------------------------------------------------

/// Best-effort report of a (possibly partially applied) write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub inserted: usize,
    pub deleted: usize,
    pub modified: usize,
    pub errors: Vec<String>,
}

impl WriteOutcome {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self { errors: vec![msg.into()], ..Self::default() }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn absorb(&mut self, other: WriteOutcome) {
        self.inserted += other.inserted;
        self.deleted += other.deleted;
        self.modified += other.modified;
        self.errors.extend(other.errors);
    }
}

impl std::fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} deleted, {} modified, {} errors",
            self.inserted,
            self.deleted,
            self.modified,
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trips_through_wire_name() {
        for level in Level::ALL {
            assert_eq!(Level::parse(level.as_str()), Some(level));
        }
        assert_eq!(Level::parse("federal-upper"), None);
        assert_eq!(serde_json::to_value(Level::StateLower).unwrap(), "state-lower");
    }

    #[test]
    fn field_keys_are_known_columns() {
        assert_eq!(Field::from_key("audioPath"), Some(Field::AudioPath));
        assert_eq!(Field::from_key("audio_path"), None);
        assert_eq!(Field::from_key("_id"), None);
        assert!(!Field::Level.is_fillable());
        assert!(Field::Phones.is_fillable());
    }

    #[test]
    fn document_uses_camel_case_and_omits_absent_district() {
        let rec = LegislatorRecord::new(Level::FedUpper, "AL", "Jane Doe");
        let doc = rec.to_document();
        assert_eq!(doc["level"], "fed-upper");
        assert_eq!(doc["audioPath"], "");
        assert!(doc.get("district").is_none());
        assert!(doc.get("_id").is_none());
    }

    #[test]
    fn null_clause_matches_missing_field() {
        let at_large = LegislatorRecord::new(Level::FedLower, "AK", "Don Young");
        let seated = at_large.clone().with_district("1");

        let f = Filter::scope(Level::FedLower, "AK").eq(Field::District, Value::Null);
        assert!(f.matches(&at_large));
        assert!(!f.matches(&seated));

        let f = Filter::scope(Level::FedLower, "AK").eq(Field::District, "1");
        assert!(f.matches(&seated));
        assert!(!f.matches(&at_large));
    }

    #[test]
    fn empty_list_clause_selects_missing_contacts() {
        let mut rec = LegislatorRecord::new(Level::StateUpper, "OH", "A");
        let f = Filter::new().eq(Field::Phones, Value::Array(vec![]));
        assert!(f.matches(&rec));
        rec.phones.push(Phone { number: "555".into() });
        assert!(!f.matches(&rec));
    }

    #[test]
    fn scope_filters_cross_levels_and_states() {
        let states = vec!["AL".to_string(), "AK".to_string()];
        let filters = scope_filters(&[Level::FedLower, Level::StateLower], Some(&states));
        assert_eq!(filters.len(), 4);
        assert_eq!(filters[0], Filter::scope(Level::FedLower, "AL"));

        let all = scope_filters(&[Level::FedUpper], None);
        assert_eq!(all.len(), 1);
        assert!(!all[0].clauses.contains_key("state"));
    }

    #[test]
    fn flagged_decisions_admit_only_on_reject() {
        assert!(MergeDecision::Accept.admits());
        assert!(!MergeDecision::Skip.admits());
        assert!(MergeDecision::Flagged(ResolutionOutcome::Reject).admits());
        assert!(!MergeDecision::Flagged(ResolutionOutcome::Accept("x".into())).admits());
        assert!(!MergeDecision::Flagged(ResolutionOutcome::Discard).admits());
    }

    #[test]
    fn copy_field_never_touches_identity() {
        let mut target = LegislatorRecord::new(Level::StateLower, "VT", "Target");
        let mut source = LegislatorRecord::new(Level::StateUpper, "NH", "Source");
        source.pronunciation = "SOR-s".into();
        target.copy_field_from(&source, Field::Name);
        target.copy_field_from(&source, Field::Level);
        target.copy_field_from(&source, Field::Pronunciation);
        assert_eq!(target.name, "Target");
        assert_eq!(target.level, Level::StateLower);
        assert_eq!(target.pronunciation, "SOR-s");
    }
}
