//! End-to-end write operations: insert an import batch, delete, move.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::import::ImportBatch;
use crate::merge::merge_candidates;
use crate::model::{Filter, MergeDecision, WriteOutcome};
use crate::oracle::ResolutionOracle;
use crate::store::{pull_any, RecordStore};
use crate::template::propagate;

// ---------------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
pub struct InsertReport {
    /// Records offered for insertion after import resolution.
    pub candidates: usize,
    /// One per candidate when merge checking ran.
    pub decisions: Vec<MergeDecision>,
    /// Records left undecided by the import, never written.
    pub pending: usize,
    pub outcome: WriteOutcome,
}

/// Merge-check (optional), template-fill, then bulk insert a resolved batch.
pub fn insert(
    batch: ImportBatch,
    store: &mut dyn RecordStore,
    oracle: &mut dyn ResolutionOracle,
    config: &EngineConfig,
    merge: bool,
    now: DateTime<Utc>,
) -> InsertReport {
    let mut report = InsertReport {
        candidates: batch.records.len(),
        pending: batch.pending.len(),
        ..InsertReport::default()
    };

    let admitted = if merge {
        let (decisions, admitted) = merge_candidates(batch.records, &*store, oracle, config);
        report.decisions = decisions;
        admitted
    } else {
        batch.records
    };

    let filled = propagate(admitted, &batch.columns, &*store, &config.template, now);
    report.outcome = store.bulk_insert(&filled);
    log::info!("insert into {}: {}", store.name(), report.outcome);
    report
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

pub fn delete_by_criteria(store: &mut dyn RecordStore, filters: &[Filter]) -> WriteOutcome {
    let outcome = store.bulk_delete(filters);
    log::info!("delete from {}: {}", store.name(), outcome);
    outcome
}

/// One filter per listed record, built from the columns the list supplied.
pub fn listed_filters(batch: &ImportBatch) -> Vec<Filter> {
    batch
        .records
        .iter()
        .map(|record| {
            batch
                .columns
                .iter()
                .fold(Filter::new(), |filter, field| filter.eq(*field, record.field_value(*field)))
        })
        .collect()
}

pub fn delete_listed(batch: &ImportBatch, store: &mut dyn RecordStore) -> WriteOutcome {
    delete_by_criteria(store, &listed_filters(batch))
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveMode {
    /// Copy every selected record.
    Append,
    /// Copy only records the destination does not already hold.
    AppendMissing,
    /// Clear the selection in the destination, then copy.
    Replace,
}

impl FromStr for MoveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(Self::Append),
            "append-missing" => Ok(Self::AppendMissing),
            "replace" => Ok(Self::Replace),
            other => Err(format!("unknown move mode '{other}' (expected append, append-missing or replace)")),
        }
    }
}

/// Copy the records selected by `filters` from `source` into `dest`.
/// Documents keep their `_id`.
pub fn move_records(
    source: &dyn RecordStore,
    dest: &mut dyn RecordStore,
    filters: &[Filter],
    mode: MoveMode,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    let mut records = pull_any(source, filters);

    match mode {
        MoveMode::Append => {}
        MoveMode::AppendMissing => {
            let existing = pull_any(&*dest, filters);
            records.retain(|r| !existing.contains(r));
        }
        MoveMode::Replace => outcome.absorb(dest.bulk_delete(filters)),
    }

    outcome.absorb(dest.bulk_insert(&records));
    log::info!("move {} -> {} ({mode:?}): {outcome}", source.name(), dest.name());
    outcome
}
