//! Seat audit against canonical district lists, plus the repair passes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::NewSeatDefaults;
use crate::matcher::{extract, strip_leading_number};
use crate::model::{Field, Filter, Level, LegislatorRecord, MatchCandidate, ResolutionOutcome, WriteOutcome};
use crate::oracle::{ResolutionMode, ResolutionOracle, ResolutionRequest};
use crate::registry::{mix_sort, DistrictRegistry};
use crate::states::{all_codes, state_name};
use crate::store::{pull, RecordStore};

/// Candidate list size for fuzzy district repair.
const REPAIR_CHOICES: usize = 20;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeatFinding {
    /// Canonical district with no record.
    NotFilled { district: String },
    /// District held in the store that the reference does not know.
    NoMatch { district: String, names: Vec<String> },
    /// Canonical district held by more than one record.
    Multiple { district: String, names: Vec<String> },
    /// Senate delegation that is not two distinct people.
    SenateCount { state: String, names: Vec<String> },
}

impl fmt::Display for SeatFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFilled { district } => write!(f, "District {district}: Not filled"),
            Self::NoMatch { district, .. } => write!(f, "District {district}: No match in calling"),
            Self::Multiple { district, names } => {
                write!(f, "District {district}: Multiple legislators - {}", names.join(", "))
            }
            Self::SenateCount { state, names } => {
                write!(f, "{} ({}/2): {}", state_name(state), names.len(), names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub level: Level,
    pub state: String,
    pub heading: String,
    pub findings: Vec<SeatFinding>,
}

impl ScopeReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeatReport {
    pub sections: Vec<ScopeReport>,
}

impl SeatReport {
    pub fn is_clean(&self) -> bool {
        self.sections.iter().all(ScopeReport::is_clean)
    }

    pub fn finding_count(&self) -> usize {
        self.sections.iter().map(|s| s.findings.len()).sum()
    }
}

/// Clean sections are omitted; a heading shared by consecutive sections is
/// printed once.
impl fmt::Display for SeatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut last_heading: Option<&str> = None;
        for section in self.sections.iter().filter(|s| !s.is_clean()) {
            if last_heading != Some(section.heading.as_str()) {
                if last_heading.is_some() {
                    writeln!(f)?;
                }
                writeln!(f, "{}", section.heading)?;
                last_heading = Some(&section.heading);
            }
            for finding in &section.findings {
                writeln!(f, "{finding}")?;
            }
        }
        Ok(())
    }
}

pub fn heading(level: Level, state: &str) -> String {
    let name = state_name(state);
    match level {
        Level::FedUpper => "United States Senate".to_string(),
        Level::FedLower => format!("{name} Federal House"),
        Level::StateUpper => format!("{name} Senate"),
        Level::StateLower => format!("{name} House"),
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Store records in scope grouped by district label. A missing district is
/// keyed by the empty string.
fn seats_in_store(store: &dyn RecordStore, level: Level, state: &str) -> BTreeMap<String, Vec<LegislatorRecord>> {
    let mut seats: BTreeMap<String, Vec<LegislatorRecord>> = BTreeMap::new();
    for record in pull(store, &Filter::scope(level, state)) {
        let label = record.district.clone().unwrap_or_default();
        seats.entry(label).or_default().push(record);
    }
    seats
}

fn names(records: &[LegislatorRecord]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}

pub fn audit_scope(level: Level, state: &str, registry: &DistrictRegistry, store: &dyn RecordStore) -> ScopeReport {
    let mut report = ScopeReport {
        level,
        state: state.to_string(),
        heading: heading(level, state),
        findings: Vec::new(),
    };

    if !level.is_district_based() {
        let mut senators: Vec<String> = pull(store, &Filter::scope(level, state))
            .into_iter()
            .filter(|r| r.active)
            .map(|r| r.name)
            .collect();
        senators.sort();
        let mut distinct = senators.clone();
        distinct.dedup();
        if senators.len() != 2 || distinct.len() != senators.len() {
            report.findings.push(SeatFinding::SenateCount { state: state.to_string(), names: senators });
        }
        return report;
    }

    let canon = registry.districts_for(level, state);
    let seats = seats_in_store(store, level, state);
    let all = mix_sort(canon.iter().cloned().chain(seats.keys().cloned()));

    for district in all {
        let held = seats.get(&district).map(Vec::as_slice).unwrap_or(&[]);
        let canonical = canon.contains(&district);
        if canonical && held.is_empty() {
            report.findings.push(SeatFinding::NotFilled { district: district.clone() });
        } else if !canonical {
            report.findings.push(SeatFinding::NoMatch { district: district.clone(), names: names(held) });
        }
        if canonical && held.len() > 1 {
            report.findings.push(SeatFinding::Multiple { district, names: names(held) });
        }
    }
    report
}

/// Audit every level × state. `states = None` covers all fifty.
pub fn audit(levels: &[Level], states: Option<&[String]>, registry: &DistrictRegistry, store: &dyn RecordStore) -> SeatReport {
    let codes: Vec<String> = match states {
        Some(s) => s.to_vec(),
        None => all_codes().into_iter().map(str::to_string).collect(),
    };
    let mut report = SeatReport::default();
    for level in levels {
        for state in &codes {
            report.sections.push(audit_scope(*level, state, registry, store));
        }
    }
    log::info!("audit: {} findings across {} scopes", report.finding_count(), report.sections.len());
    report
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
pub struct RepairReport {
    /// Names inserted into empty seats.
    pub added: Vec<String>,
    /// Names retained on a multiply-held seat.
    pub retained: Vec<String>,
    /// Store label → canonical label.
    pub renamed: Vec<(String, String)>,
    pub outcome: WriteOutcome,
}

/// Fill empty seats with a name from the oracle and reduce multiply-held
/// seats to the record the oracle picks. Senate scopes are left alone.
pub fn repair_seats(
    level: Level,
    state: &str,
    registry: &DistrictRegistry,
    store: &mut dyn RecordStore,
    oracle: &mut dyn ResolutionOracle,
    defaults: &NewSeatDefaults,
    now: DateTime<Utc>,
) -> RepairReport {
    let mut report = RepairReport::default();
    if !level.is_district_based() {
        return report;
    }

    let seats = seats_in_store(&*store, level, state);
    for finding in audit_scope(level, state, registry, &*store).findings {
        match finding {
            SeatFinding::NotFilled { district } => {
                let subject = format!("{} {} District {district}", state_name(state), level.seat_title());
                let Some(name) = oracle.provide_name(&subject).filter(|n| !n.trim().is_empty()) else {
                    log::debug!("{subject}: skipped");
                    continue;
                };
                let record = new_seat(level, state, &district, name.trim(), defaults, now);
                report.outcome.absorb(store.bulk_insert(&[record]));
                report.added.push(name.trim().to_string());
            }
            SeatFinding::Multiple { district, names } => {
                let held = seats.get(&district).map(Vec::as_slice).unwrap_or(&[]);
                let candidates: Vec<MatchCandidate> =
                    names.iter().map(|n| MatchCandidate { value: n.clone(), score: 0 }).collect();
                let request = ResolutionRequest {
                    subject: format!("{} District {district}", state_name(state)),
                    field: Field::Name,
                    value: &district,
                    candidates: &candidates,
                    mode: ResolutionMode::RetainOne,
                };
                let ResolutionOutcome::Accept(keep) = oracle.resolve(&request) else {
                    continue;
                };
                let Some(kept) = held.iter().position(|r| r.name == keep) else {
                    log::warn!("District {district}: '{keep}' does not hold this seat");
                    continue;
                };
                for (i, record) in held.iter().enumerate() {
                    if i == kept {
                        continue;
                    }
                    if let Some(id) = record.id.as_deref() {
                        report.outcome.absorb(store.delete_one(id));
                    }
                }
                report.retained.push(keep);
            }
            SeatFinding::NoMatch { .. } | SeatFinding::SenateCount { .. } => {}
        }
    }
    report
}

fn new_seat(
    level: Level,
    state: &str,
    district: &str,
    name: &str,
    defaults: &NewSeatDefaults,
    now: DateTime<Utc>,
) -> LegislatorRecord {
    let mut record = LegislatorRecord::new(level, state, name).with_district(district);
    record.title = level.seat_title().to_string();
    record.country = Some(defaults.country.clone());
    record.active = defaults.active;
    record.needs_audio = defaults.needs_audio;
    record.needs_review = defaults.needs_review;
    record.date_added = Some(now);
    record.date_modified = Some(now);
    record
}

/// Offer each store-only district label a ranked list of the canonical
/// labels nobody holds yet, comparing with leading numbers stripped. On a
/// choice, every record carrying the label is rewritten.
pub fn repair_districts(
    level: Level,
    state: &str,
    registry: &DistrictRegistry,
    store: &mut dyn RecordStore,
    oracle: &mut dyn ResolutionOracle,
) -> RepairReport {
    let mut report = RepairReport::default();
    if !level.is_district_based() {
        return report;
    }

    let canon = registry.districts_for(level, state);
    let seats = seats_in_store(&*store, level, state);
    let unknown = mix_sort(seats.keys().filter(|d| !d.is_empty() && !canon.contains(d)).cloned());
    let mut remaining: Vec<String> = canon.into_iter().filter(|d| !seats.contains_key(d)).collect();

    for label in unknown {
        if remaining.is_empty() {
            break;
        }
        let candidates = extract(&label, &remaining, strip_leading_number, REPAIR_CHOICES);
        let request = ResolutionRequest {
            subject: format!("{} District {label}", state_name(state)),
            field: Field::District,
            value: &label,
            candidates: &candidates,
            mode: ResolutionMode::DistrictRepair,
        };
        let ResolutionOutcome::Accept(canonical) = oracle.resolve(&request) else {
            log::debug!("District {label}: no match");
            continue;
        };
        let Some(pos) = remaining.iter().position(|d| *d == canonical) else {
            log::warn!("District {label}: '{canonical}' is not an open canonical label");
            continue;
        };
        remaining.remove(pos);

        for record in seats.get(&label).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(id) = record.id.as_deref() {
                report.outcome.absorb(store.update_one(id, Field::District, canonical.as_str().into()));
            }
        }
        log::info!("District {label} -> {canonical}");
        report.renamed.push((label, canonical));
    }
    report
}
