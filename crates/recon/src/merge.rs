//! Tiered duplicate detection for incoming records.

use serde_json::Value;

use crate::config::EngineConfig;
use crate::matcher::{IdentityMatch, IdentityMatcher};
use crate::model::{Field, Filter, LegislatorRecord, MergeDecision, ResolutionOutcome};
use crate::oracle::{ResolutionMode, ResolutionOracle, ResolutionRequest};
use crate::store::{pull, RecordStore};

/// Classify `candidate` against the destination store, most specific tier
/// first: exact seat + name, then name within scope, then the whole scope.
pub fn decide(
    candidate: &LegislatorRecord,
    store: &dyn RecordStore,
    oracle: &mut dyn ResolutionOracle,
    config: &EngineConfig,
) -> MergeDecision {
    let district = match &candidate.district {
        Some(d) => Value::from(d.as_str()),
        None => Value::Null,
    };
    let named = Filter::scope(candidate.level, &candidate.state).eq(Field::Name, candidate.name.as_str());

    if pull(store, &named.clone().eq(Field::District, district)).len() == 1 {
        log::debug!("{}: exact duplicate, skipping", candidate.name);
        return MergeDecision::Skip;
    }

    let same_name = pull(store, &named);
    match same_name.len() {
        0 => {}
        1 => {
            log::debug!("{}: already present in scope, skipping", candidate.name);
            return MergeDecision::Skip;
        }
        _ => return ask(candidate, &same_name, IdentityMatcher::merge(0), oracle),
    }

    let pool = pull(store, &Filter::scope(candidate.level, &candidate.state));
    if pool.is_empty() {
        return MergeDecision::Accept;
    }
    ask(candidate, &pool, IdentityMatcher::merge(config.merge_floor), oracle)
}

fn ask(
    candidate: &LegislatorRecord,
    pool: &[LegislatorRecord],
    matcher: IdentityMatcher,
    oracle: &mut dyn ResolutionOracle,
) -> MergeDecision {
    let names: Vec<String> = pool.iter().map(|r| r.name.clone()).collect();
    match matcher.matches(&candidate.name, &names) {
        IdentityMatch::Unique(existing) => MergeDecision::Flagged(ResolutionOutcome::Accept(existing)),
        IdentityMatch::UniqueByDefault | IdentityMatch::NoMatch => MergeDecision::Accept,
        IdentityMatch::Ambiguous(candidates) => {
            let request = ResolutionRequest {
                subject: format!(
                    "{} ({} {} {})",
                    candidate.name,
                    candidate.level,
                    candidate.state,
                    candidate.district.as_deref().unwrap_or("at-large")
                ),
                field: Field::Name,
                value: &candidate.name,
                candidates: &candidates,
                mode: ResolutionMode::MergeDecision,
            };
            MergeDecision::Flagged(oracle.resolve(&request))
        }
    }
}

/// Decide every candidate and return the decisions alongside the records
/// that go on to insertion.
pub fn merge_candidates(
    candidates: Vec<LegislatorRecord>,
    store: &dyn RecordStore,
    oracle: &mut dyn ResolutionOracle,
    config: &EngineConfig,
) -> (Vec<MergeDecision>, Vec<LegislatorRecord>) {
    let mut decisions = Vec::with_capacity(candidates.len());
    let mut admitted = Vec::new();
    for candidate in candidates {
        let decision = decide(&candidate, store, oracle, config);
        if decision.admits() {
            admitted.push(candidate);
        }
        decisions.push(decision);
    }
    log::info!("merge: {} of {} candidates admitted", admitted.len(), decisions.len());
    (decisions, admitted)
}
