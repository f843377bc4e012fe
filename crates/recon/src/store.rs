//! Record store contract and an in-memory implementation.

use serde_json::Value;

use crate::error::ReconError;
use crate::model::{Field, Filter, LegislatorRecord, WriteOutcome};

pub trait RecordStore {
    /// Display name of the collection (e.g. the configured store name).
    fn name(&self) -> &str;

    /// All documents matching `filter`. An empty filter matches everything.
    fn find(&self, filter: &Filter) -> Result<Vec<LegislatorRecord>, ReconError>;

    fn find_one(&self, filter: &Filter) -> Result<Option<LegislatorRecord>, ReconError> {
        Ok(self.find(filter)?.into_iter().next())
    }

    /// Insert in order. Documents without an `_id` get one assigned.
    fn bulk_insert(&mut self, records: &[LegislatorRecord]) -> WriteOutcome;

    /// Remove every document matching any of `filters`, applied in order.
    fn bulk_delete(&mut self, filters: &[Filter]) -> WriteOutcome;

    /// Set a single field on the document with the given `_id`.
    fn update_one(&mut self, id: &str, field: Field, value: Value) -> WriteOutcome;

    fn delete_one(&mut self, id: &str) -> WriteOutcome {
        self.bulk_delete(&[Filter::new().eq_key("_id", id)])
    }
}

/// Soft read: a failing store yields no records.
pub fn pull(store: &dyn RecordStore, filter: &Filter) -> Vec<LegislatorRecord> {
    match store.find(filter) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("{}: read {filter} failed, treating as empty: {e}", store.name());
            Vec::new()
        }
    }
}

/// Soft read over a union of filters, concatenated in filter order.
pub fn pull_any(store: &dyn RecordStore, filters: &[Filter]) -> Vec<LegislatorRecord> {
    filters.iter().flat_map(|f| pull(store, f)).collect()
}

pub fn pull_one(store: &dyn RecordStore, filter: &Filter) -> Option<LegislatorRecord> {
    match store.find_one(filter) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("{}: read {filter} failed, treating as empty: {e}", store.name());
            None
        }
    }
}

/// Apply `field = value` to a document, returning the updated record.
pub fn apply_update(record: &LegislatorRecord, field: Field, value: Value) -> Result<LegislatorRecord, ReconError> {
    let mut doc = record.to_document();
    match doc.as_object_mut() {
        Some(map) => {
            if value.is_null() {
                map.remove(field.key());
            } else {
                map.insert(field.key().to_string(), value);
            }
        }
        None => return Err(ReconError::Store("document is not an object".into())),
    }
    LegislatorRecord::from_document(doc)
}

/// Vec-backed store. Ids are assigned sequentially.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    records: Vec<LegislatorRecord>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), records: Vec::new(), next_id: 1 }
    }

    pub fn with_records(name: impl Into<String>, records: Vec<LegislatorRecord>) -> Self {
        let mut store = Self::new(name);
        store.bulk_insert(&records);
        store
    }

    pub fn records(&self) -> &[LegislatorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Filter) -> Result<Vec<LegislatorRecord>, ReconError> {
        Ok(self.records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    fn bulk_insert(&mut self, records: &[LegislatorRecord]) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        for record in records {
            let mut record = record.clone();
            match &record.id {
                Some(id) if self.records.iter().any(|r| r.id.as_deref() == Some(id)) => {
                    outcome.errors.push(format!("duplicate _id {id}"));
                    continue;
                }
                Some(_) => {}
                None => {
                    let id = loop {
                        let candidate = format!("m{}", self.next_id);
                        self.next_id += 1;
                        if !self.records.iter().any(|r| r.id.as_deref() == Some(candidate.as_str())) {
                            break candidate;
                        }
                    };
                    record.id = Some(id);
                }
            }
            self.records.push(record);
            outcome.inserted += 1;
        }
        outcome
    }

    fn bulk_delete(&mut self, filters: &[Filter]) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        for filter in filters {
            let before = self.records.len();
            self.records.retain(|r| !filter.matches(r));
            outcome.deleted += before - self.records.len();
        }
        outcome
    }

    fn update_one(&mut self, id: &str, field: Field, value: Value) -> WriteOutcome {
        let Some(slot) = self.records.iter_mut().find(|r| r.id.as_deref() == Some(id)) else {
            return WriteOutcome::failed(format!("no document with _id {id}"));
        };
        match apply_update(slot, field, value) {
            Ok(updated) => {
                *slot = updated;
                WriteOutcome { modified: 1, ..WriteOutcome::default() }
            }
            Err(e) => WriteOutcome::failed(e.to_string()),
        }
    }
}
