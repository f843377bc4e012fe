use crate::model::MatchCandidate;

/// Reference sets at or below this size go to the oracle whole.
pub const SMALL_SET: usize = 5;

/// Threshold decrement per narrowing pass.
const STEP: i32 = 5;

/// Outcome of matching one literal against a reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMatch {
    /// Exactly one entry fits; resolved without asking.
    Unique(String),
    /// The threshold hit the floor before enough entries passed. Callers
    /// take the literal as-is.
    UniqueByDefault,
    /// Several plausible entries; the oracle decides.
    Ambiguous(Vec<MatchCandidate>),
    NoMatch,
}

/// Similarity ratio in 0..=100.
pub fn similarity(a: &str, b: &str) -> u8 {
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMatcher {
    /// Threshold at which narrowing gives up and accepts by default.
    pub floor: u8,
    /// Auto-resolve literals that prefix exactly one reference entry.
    pub prefix_resolution: bool,
}

impl IdentityMatcher {
    /// Field correction (district labels, listed names): never escape
    /// early, accept unique prefixes.
    pub fn correction() -> Self {
        Self { floor: 0, prefix_resolution: true }
    }

    /// Merge decisions on person names: escape at `floor`, no prefix
    /// shortcut.
    pub fn merge(floor: u8) -> Self {
        Self { floor, prefix_resolution: false }
    }

    pub fn matches(&self, value: &str, reference: &[String]) -> IdentityMatch {
        if reference.is_empty() {
            return IdentityMatch::NoMatch;
        }

        if self.prefix_resolution && value.chars().count() > 3 {
            let mut prefixed = reference.iter().filter(|r| r.starts_with(value));
            if let (Some(only), None) = (prefixed.next(), prefixed.next()) {
                return IdentityMatch::Unique(only.clone());
            }
        }

        if reference.len() <= SMALL_SET {
            return IdentityMatch::Ambiguous(score_all(value, reference));
        }

        let floor = i32::from(self.floor);
        let mut threshold = 100;
        loop {
            threshold -= STEP;
            if threshold <= floor {
                return IdentityMatch::UniqueByDefault;
            }
            let mut passing: Vec<MatchCandidate> = score_all(value, reference)
                .into_iter()
                .filter(|c| i32::from(c.score) >= threshold)
                .collect();
            if passing.len() >= SMALL_SET {
                passing.sort_by(|a, b| b.score.cmp(&a.score));
                log::debug!("'{value}': {} candidates at threshold {threshold}", passing.len());
                return IdentityMatch::Ambiguous(passing);
            }
        }
    }
}

fn score_all(value: &str, reference: &[String]) -> Vec<MatchCandidate> {
    reference
        .iter()
        .map(|r| MatchCandidate { value: r.clone(), score: similarity(value, r) })
        .collect()
}

/// Rank `choices` against `query`, best first, after running both sides
/// through `processor`. Ties keep choice order.
pub fn extract<F>(query: &str, choices: &[String], processor: F, limit: usize) -> Vec<MatchCandidate>
where
    F: Fn(&str) -> String,
{
    let processed_query = processor(query);
    let mut ranked: Vec<MatchCandidate> = choices
        .iter()
        .map(|c| MatchCandidate {
            value: c.clone(),
            score: similarity(&processed_query, &processor(c)),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Drop a leading numeric token: `"12 Essex"` → `"Essex"`. Single tokens
/// are returned unchanged.
pub fn strip_leading_number(label: &str) -> String {
    let mut tokens = label.split(' ');
    match (tokens.next(), tokens.clone().next()) {
        (Some(first), Some(_)) if first.parse::<i64>().is_ok() => tokens.collect::<Vec<_>>().join(" "),
        _ => label.to_string(),
    }
}
