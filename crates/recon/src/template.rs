//! Fill admitted records with defaults taken from a peer document.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::TemplateDefaults;
use crate::error::ReconError;
use crate::model::{Field, Filter, Level, LegislatorRecord};
use crate::store::{apply_update, pull_one, RecordStore};

/// Reset a peer document according to `defaults`. Stripped fields are left
/// as they are here and excluded later by the overlay.
pub fn prepare_template(
    peer: &LegislatorRecord,
    defaults: &TemplateDefaults,
    now: DateTime<Utc>,
) -> Result<LegislatorRecord, ReconError> {
    let mut template = peer.clone();
    template.id = None;

    let stamp = Value::from(now.to_rfc3339());
    let resets = [
        (&defaults.stamp, stamp),
        (&defaults.empty, Value::from("")),
        (&defaults.empty_list, Value::Array(Vec::new())),
        (&defaults.set_true, Value::Bool(true)),
        (&defaults.set_false, Value::Bool(false)),
    ];
    for (fields, value) in resets {
        for field in fields {
            template = apply_update(&template, *field, value.clone())?;
        }
    }
    Ok(template)
}

/// Overlay template defaults onto every (level, state) group of at least two
/// candidates. Identity fields and columns the source supplied are never
/// overwritten. Everything else passes through as-is, in input order.
pub fn propagate(
    candidates: Vec<LegislatorRecord>,
    supplied: &[Field],
    store: &dyn RecordStore,
    defaults: &TemplateDefaults,
    now: DateTime<Utc>,
) -> Vec<LegislatorRecord> {
    let mut group_sizes: HashMap<(Level, String), usize> = HashMap::new();
    for c in &candidates {
        *group_sizes.entry((c.level, c.state.clone())).or_default() += 1;
    }

    let overlay: Vec<Field> = defaults
        .overlay_fields()
        .into_iter()
        .filter(|f| !supplied.contains(f))
        .collect();

    let mut templates: HashMap<(Level, String), Option<LegislatorRecord>> = HashMap::new();
    let mut filled = 0usize;
    let mut out = Vec::with_capacity(candidates.len());

    for mut candidate in candidates {
        let key = (candidate.level, candidate.state.clone());
        if group_sizes.get(&key).copied().unwrap_or(0) < 2 {
            out.push(candidate);
            continue;
        }

        let template = templates.entry(key).or_insert_with(|| {
            let peer = pull_one(store, &Filter::scope(candidate.level, &candidate.state))?;
            match prepare_template(&peer, defaults, now) {
                Ok(t) => Some(t),
                Err(e) => {
                    log::warn!("{} {}: template unusable: {e}", candidate.level, candidate.state);
                    None
                }
            }
        });

        if let Some(template) = template {
            for field in &overlay {
                candidate.copy_field_from(template, *field);
            }
            filled += 1;
        }
        out.push(candidate);
    }

    log::info!("template: filled {filled} of {} records", out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Email, Phone};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn peer_store() -> MemoryStore {
        let mut peer = LegislatorRecord::new(Level::StateLower, "VT", "Old Member").with_district("Addison-1");
        peer.title = "Representative".into();
        peer.country = Some("us".into());
        peer.emails.push(Email { address: "old@vt.gov".into() });
        peer.phones.push(Phone { number: "555".into() });
        peer.audio_path = "old.mp3".into();
        peer.needs_review = true;
        peer.active = false;
        MemoryStore::with_records("dest", vec![peer])
    }

    #[test]
    fn template_applies_resets() {
        let store = peer_store();
        let t = prepare_template(&store.records()[0], &TemplateDefaults::default(), now()).unwrap();
        assert!(t.id.is_none());
        assert!(t.emails.is_empty());
        assert!(t.audio_path.is_empty());
        assert!(t.active);
        assert!(!t.needs_review);
        assert_eq!(t.date_added, Some(now()));
        assert_eq!(t.country.as_deref(), Some("us"));
    }

    #[test]
    fn overlay_skips_identity_and_supplied_columns() {
        let store = peer_store();
        let mut a = LegislatorRecord::new(Level::StateLower, "VT", "A").with_district("Addison-2");
        a.pronunciation = "AY".into();
        let b = LegislatorRecord::new(Level::StateLower, "VT", "B").with_district("Bennington-1");

        let out = propagate(
            vec![a, b],
            &[Field::Level, Field::State, Field::District, Field::Name, Field::Pronunciation],
            &store,
            &TemplateDefaults::default(),
            now(),
        );
        assert_eq!(out[0].name, "A");
        assert_eq!(out[0].district.as_deref(), Some("Addison-2"));
        assert!(out[0].title.is_empty(), "title is identity, never overlaid");
        assert_eq!(out[0].pronunciation, "AY");
        assert_eq!(out[0].country.as_deref(), Some("us"));
        assert_eq!(out[1].date_modified, Some(now()));
    }

    #[test]
    fn lone_candidate_and_missing_template_pass_through() {
        let store = peer_store();
        let lone = LegislatorRecord::new(Level::StateLower, "VT", "Solo").with_district("Addison-2");
        let ohio = vec![
            LegislatorRecord::new(Level::StateUpper, "OH", "X").with_district("1"),
            LegislatorRecord::new(Level::StateUpper, "OH", "Y").with_district("2"),
        ];
        let mut input = vec![lone.clone()];
        input.extend(ohio.clone());

        let out = propagate(input, &[], &store, &TemplateDefaults::default(), now());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], lone);
        assert_eq!(out[1], ohio[0]);
        assert!(out[2].date_added.is_none());
    }
}
