//! Pluggable decision source consulted when matching is ambiguous.
//!
//! Calls block until a decision is available; an interactive implementation
//! may wait on a human indefinitely.

use std::collections::VecDeque;

use serde::Serialize;

use crate::model::{Field, MatchCandidate, ResolutionOutcome};

/// Why the oracle is being asked, which also fixes how its answer is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Correct a field value. Accept = use the candidate, Discard = drop the
    /// record, Reject = no decision (record stays pending).
    FieldCorrection,
    /// Is the incoming record one of these existing ones? Accept = yes (do
    /// not insert), Reject = none of them.
    MergeDecision,
    /// Several records hold one seat. Accept = keep this one, Reject = leave
    /// the seat untouched.
    RetainOne,
    /// Map a store-only district label onto a canonical one.
    DistrictRepair,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionRequest<'a> {
    /// Human-readable description of the record being resolved.
    pub subject: String,
    pub field: Field,
    /// The literal being resolved.
    pub value: &'a str,
    pub candidates: &'a [MatchCandidate],
    pub mode: ResolutionMode,
}

pub trait ResolutionOracle {
    fn resolve(&mut self, request: &ResolutionRequest<'_>) -> ResolutionOutcome;

    /// Free-text answer, used to name the holder of an empty seat. `None`
    /// skips the seat.
    fn provide_name(&mut self, subject: &str) -> Option<String>;
}

/// Answers from a fixed script, in order. Once exhausted every question is
/// rejected / skipped. Used for replaying a recorded session and in tests.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    outcomes: VecDeque<ResolutionOutcome>,
    names: VecDeque<Option<String>>,
    /// Every request seen, as (subject, mode, candidate values).
    pub asked: Vec<(String, ResolutionMode, Vec<String>)>,
}

impl ScriptedOracle {
    pub fn new(outcomes: impl IntoIterator<Item = ResolutionOutcome>) -> Self {
        Self { outcomes: outcomes.into_iter().collect(), ..Self::default() }
    }

    pub fn with_names(mut self, names: impl IntoIterator<Item = Option<String>>) -> Self {
        self.names = names.into_iter().collect();
        self
    }
}

impl ResolutionOracle for ScriptedOracle {
    fn resolve(&mut self, request: &ResolutionRequest<'_>) -> ResolutionOutcome {
        self.asked.push((
            request.subject.clone(),
            request.mode,
            request.candidates.iter().map(|c| c.value.clone()).collect(),
        ));
        self.outcomes.pop_front().unwrap_or(ResolutionOutcome::Reject)
    }

    fn provide_name(&mut self, _subject: &str) -> Option<String> {
        self.names.pop_front().flatten()
    }
}

/// Unattended policy: take the best candidate when it scores at least
/// `min_score`, otherwise reject. Never supplies names.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdOracle {
    pub min_score: u8,
}

impl ResolutionOracle for ThresholdOracle {
    fn resolve(&mut self, request: &ResolutionRequest<'_>) -> ResolutionOutcome {
        let best = request
            .candidates
            .iter()
            .fold(None::<&MatchCandidate>, |best, c| match best {
                Some(b) if b.score >= c.score => Some(b),
                _ => Some(c),
            });
        match best {
            Some(c) if c.score >= self.min_score => {
                log::debug!("{}: auto-selected '{}' ({})", request.subject, c.value, c.score);
                ResolutionOutcome::Accept(c.value.clone())
            }
            _ => ResolutionOutcome::Reject,
        }
    }

    fn provide_name(&mut self, subject: &str) -> Option<String> {
        log::info!("{subject}: left empty (no name source in batch mode)");
        None
    }
}
