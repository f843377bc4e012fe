//! Canonical district lists per (level, state).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ReconError;
use crate::model::Level;

/// Canonical district identifiers, loaded wholesale and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct DistrictRegistry {
    districts: BTreeMap<(Level, String), BTreeSet<String>>,
}

impl DistrictRegistry {
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Level, S, S)>,
        S: Into<String>,
    {
        let mut districts: BTreeMap<(Level, String), BTreeSet<String>> = BTreeMap::new();
        for (level, state, district) in rows {
            districts.entry((level, state.into())).or_default().insert(district.into());
        }
        Self { districts }
    }

    /// Parse the reference dataset: a CSV with `level`, `state` and
    /// `district` columns (any order, extra columns ignored).
    pub fn from_csv_str(data: &str) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ReconError::ReferenceData(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let idx = |name: &str| -> Result<usize, ReconError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ReconError::ReferenceData(format!("missing column '{name}'")))
        };
        let level_idx = idx("level")?;
        let state_idx = idx("state")?;
        let district_idx = idx("district")?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ReconError::ReferenceData(e.to_string()))?;
            let line = i + 2;
            let cell = |idx: usize| -> Result<String, ReconError> {
                record
                    .get(idx)
                    .map(|v| v.trim().to_string())
                    .ok_or_else(|| ReconError::ReferenceData(format!("short row on line {line}")))
            };
            let level_str = cell(level_idx)?;
            let level = Level::parse(&level_str).ok_or_else(|| {
                ReconError::ReferenceData(format!("unknown level '{level_str}' on line {line}"))
            })?;
            rows.push((level, cell(state_idx)?, cell(district_idx)?));
        }

        let registry = Self::from_rows(rows);
        log::debug!("loaded {} district scopes", registry.districts.len());
        Ok(registry)
    }

    /// Canonical districts for a scope, mixed numeric/lexical order. Unknown
    /// scopes yield an empty list.
    pub fn districts_for(&self, level: Level, state: &str) -> Vec<String> {
        match self.districts.get(&(level, state.to_string())) {
            Some(set) => mix_sort(set.iter().cloned()),
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }
}

fn numeric_value(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Two-bucket sort: numeric labels ascending by value, then the rest
/// lexically. Duplicates are dropped.
pub fn mix_sort<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let unique: BTreeSet<String> = items.into_iter().collect();
    let mut numbers: Vec<(f64, String)> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    for item in unique {
        match numeric_value(&item) {
            Some(v) => numbers.push((v, item)),
            None => words.push(item),
        }
    }
    numbers.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then_with(|| a.1.cmp(&b.1)));
    words.sort();

    numbers.into_iter().map(|(_, s)| s).chain(words).collect()
}
