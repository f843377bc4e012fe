//! Duplicate consolidation ("snowball").
//!
//! A target record absorbs audio and contact details from every record that
//! shares its identity across any number of collections. Planning is a pure
//! scan; [`commit`] writes the resulting changes one field at a time.

use serde::Serialize;
use serde_json::Value;

use crate::model::{Field, Filter, Level, LegislatorRecord, NaturalKey, WriteOutcome};
use crate::store::{pull, pull_any, RecordStore};

/// Field changes for `target`, only those that differ from its current
/// values. `collections` should include the target's own store.
pub fn plan(target: &LegislatorRecord, collections: &[&dyn RecordStore]) -> Vec<(Field, Value)> {
    let mut changes = Vec::new();

    if !target.has_audio() {
        if let Some(path) = adopt_audio(target, collections) {
            changes.push((Field::AudioPath, Value::from(path)));
        }
    }

    let identity = Filter::new()
        .eq(Field::Name, target.name.as_str())
        .eq(Field::Level, target.level.as_str());
    let peers: Vec<LegislatorRecord> = collections.iter().flat_map(|c| pull(*c, &identity)).collect();

    let emails = merge_contacts(&target.emails, peers.iter().map(|p| p.emails.as_slice()));
    if emails != target.emails {
        changes.push((Field::Emails, to_value(&emails)));
    }
    let phones = merge_contacts(&target.phones, peers.iter().map(|p| p.phones.as_slice()));
    if phones != target.phones {
        changes.push((Field::Phones, to_value(&phones)));
    }
    let networks = merge_contacts(&target.networks, peers.iter().map(|p| p.networks.as_slice()));
    if networks != target.networks {
        changes.push((Field::Networks, to_value(&networks)));
    }

    changes
}

fn to_value<T: Serialize>(items: &[T]) -> Value {
    serde_json::to_value(items).unwrap_or(Value::Array(Vec::new()))
}

/// First audio path held by a record with the same name and title, falling
/// back to name only.
fn adopt_audio(target: &LegislatorRecord, collections: &[&dyn RecordStore]) -> Option<String> {
    let by_name = Filter::new().eq(Field::Name, target.name.as_str());
    let by_title = by_name.clone().eq(Field::Title, target.title.as_str());
    for filter in [by_title, by_name] {
        for collection in collections {
            if let Some(found) = pull(*collection, &filter).into_iter().find(LegislatorRecord::has_audio) {
                log::debug!("{}: adopting audio from {}", target.name, collection.name());
                return Some(found.audio_path);
            }
        }
    }
    None
}

/// Own items deduplicated by natural key, then every unseen item from
/// `others`, first-seen order throughout.
pub fn merge_contacts<'a, T>(own: &[T], others: impl Iterator<Item = &'a [T]>) -> Vec<T>
where
    T: NaturalKey + Clone + 'a,
{
    let mut merged: Vec<T> = Vec::with_capacity(own.len());
    let push = |item: &T, merged: &mut Vec<T>| {
        if !merged.iter().any(|m| m.natural_key() == item.natural_key()) {
            merged.push(item.clone());
        }
    };
    for item in own {
        push(item, &mut merged);
    }
    for list in others {
        for item in list {
            push(item, &mut merged);
        }
    }
    merged
}

/// Write each change as a single-field update on `id`.
pub fn commit(store: &mut dyn RecordStore, id: &str, changes: &[(Field, Value)]) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    for (field, value) in changes {
        outcome.absorb(store.update_one(id, *field, value.clone()));
    }
    outcome
}

/// Plan and commit for one record. `peers` are the other collections; the
/// record's own store is always scanned first.
pub fn snowball(store: &mut dyn RecordStore, target: &LegislatorRecord, peers: &[&dyn RecordStore]) -> WriteOutcome {
    let Some(id) = target.id.as_deref() else {
        return WriteOutcome::failed(format!("{}: record has no _id", target.name));
    };
    let changes = {
        let mut collections: Vec<&dyn RecordStore> = vec![&*store];
        collections.extend_from_slice(peers);
        plan(target, &collections)
    };
    commit(store, id, &changes)
}

#[derive(Debug, Default, Serialize)]
pub struct ConsolidationReport {
    /// Names that had duplicates, once per (name, level, state) group.
    pub consolidated: Vec<String>,
    pub outcome: WriteOutcome,
}

/// For every (name, level, state) appearing more than once in scope,
/// snowball the first record and delete the others. Records sharing a name
/// across levels or states are different people and are left alone.
pub fn remove_duplicates(
    store: &mut dyn RecordStore,
    peers: &[&dyn RecordStore],
    filters: &[Filter],
) -> ConsolidationReport {
    let records = pull_any(&*store, filters);
    let mut groups: Vec<((&str, Level, &str), Vec<&LegislatorRecord>)> = Vec::new();
    for r in &records {
        let key = (r.name.as_str(), r.level, r.state.as_str());
        match groups.iter().position(|(k, _)| *k == key) {
            Some(i) => groups[i].1.push(r),
            None => groups.push((key, vec![r])),
        }
    }

    let mut report = ConsolidationReport::default();
    for ((name, level, state), group) in groups {
        let [first, rest @ ..] = group.as_slice() else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        log::debug!("{name} ({level} {state}): {} duplicates", rest.len());
        report.outcome.absorb(snowball(store, first, peers));
        for dup in rest {
            if let Some(id) = dup.id.as_deref() {
                report.outcome.absorb(store.delete_one(id));
            }
        }
        report.consolidated.push(name.to_string());
    }

    log::info!(
        "consolidate: {} names, {}",
        report.consolidated.len(),
        report.outcome
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Email, NetworkLink, Phone};
    use crate::store::MemoryStore;

    fn email(a: &str) -> Email {
        Email { address: a.into() }
    }

    #[test]
    fn emails_merge_across_collections_in_first_seen_order() {
        let mut target = LegislatorRecord::new(Level::StateUpper, "OH", "Pat Kim");
        target.emails = vec![email("a@x"), email("a@x")];
        let mut store = MemoryStore::with_records("local", vec![target]);

        let mut other = LegislatorRecord::new(Level::StateUpper, "OH", "Pat Kim");
        other.emails = vec![email("b@x"), email("a@x")];
        let peer = MemoryStore::with_records("peer", vec![other]);

        let target = store.records()[0].clone();
        let changes = plan(&target, &[&store, &peer]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, Field::Emails);
        assert_eq!(changes[0].1, serde_json::json!([{"address": "a@x"}, {"address": "b@x"}]));

        let outcome = snowball(&mut store, &target, &[&peer]);
        assert_eq!(outcome.modified, 1);

        let after = store.records()[0].clone();
        assert!(plan(&after, &[&store, &peer]).is_empty(), "second run is a no-op");
    }

    #[test]
    fn audio_prefers_matching_title_then_any() {
        let mut target = LegislatorRecord::new(Level::FedLower, "AL", "Jo Park");
        target.title = "Representative".into();
        let mut senator = LegislatorRecord::new(Level::FedUpper, "AL", "Jo Park");
        senator.title = "Senator".into();
        senator.audio_path = "senator.mp3".into();
        let peer = MemoryStore::with_records("peer", vec![senator]);

        let changes = plan(&target, &[&peer]);
        assert_eq!(changes, vec![(Field::AudioPath, Value::from("senator.mp3"))]);

        let mut rep = LegislatorRecord::new(Level::FedLower, "TX", "Jo Park");
        rep.title = "Representative".into();
        rep.audio_path = "rep.mp3".into();
        let both = MemoryStore::with_records("both", vec![peer.records()[0].clone(), rep]);
        let changes = plan(&target, &[&both]);
        assert_eq!(changes, vec![(Field::AudioPath, Value::from("rep.mp3"))]);
    }

    #[test]
    fn contacts_only_merge_within_same_level() {
        let target = LegislatorRecord::new(Level::StateLower, "VT", "Lee Ray");
        let mut other = LegislatorRecord::new(Level::StateUpper, "VT", "Lee Ray");
        other.phones.push(Phone { number: "1".into() });
        other.networks.push(NetworkLink { url: "https://x".into() });
        let peer = MemoryStore::with_records("peer", vec![other]);
        assert!(plan(&target, &[&peer]).is_empty());
    }

    #[test]
    fn remove_duplicates_keeps_first_and_absorbs_rest() {
        let mut first = LegislatorRecord::new(Level::StateLower, "VT", "Lee Ray").with_district("Addison-1");
        first.phones.push(Phone { number: "1".into() });
        let mut second = first.clone();
        second.phones = vec![Phone { number: "2".into() }];
        let other = LegislatorRecord::new(Level::StateLower, "VT", "Ann Bo").with_district("Addison-2");
        let mut store = MemoryStore::with_records("local", vec![first, other, second]);

        let report = remove_duplicates(&mut store, &[], &[Filter::scope(Level::StateLower, "VT")]);
        assert_eq!(report.consolidated, vec!["Lee Ray"]);
        assert_eq!(report.outcome.deleted, 1);
        assert_eq!(store.len(), 2);
        let kept = &store.records()[0];
        let numbers: Vec<_> = kept.phones.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, ["1", "2"]);
    }

    #[test]
    fn same_name_at_another_level_is_not_a_duplicate() {
        let mut rep = LegislatorRecord::new(Level::FedLower, "AL", "Jo Park").with_district("2");
        rep.phones.push(Phone { number: "111".into() });
        let mut senator = LegislatorRecord::new(Level::FedUpper, "AL", "Jo Park");
        senator.phones.push(Phone { number: "222".into() });
        let mut store = MemoryStore::with_records("local", vec![rep, senator]);

        let scope = [Filter::scope(Level::FedLower, "AL"), Filter::scope(Level::FedUpper, "AL")];
        let report = remove_duplicates(&mut store, &[], &scope);
        assert!(report.consolidated.is_empty());
        assert_eq!(report.outcome, WriteOutcome::default());

        let numbers: Vec<_> = store.records().iter().map(|r| r.phones[0].number.as_str()).collect();
        assert_eq!(numbers, ["111", "222"]);
    }

    #[test]
    fn same_name_in_another_state_is_not_a_duplicate() {
        let vt = LegislatorRecord::new(Level::StateLower, "VT", "John Smith").with_district("Addison-1");
        let tx = LegislatorRecord::new(Level::StateLower, "TX", "John Smith").with_district("12");
        let dup = vt.clone();
        let mut store = MemoryStore::with_records("local", vec![vt, tx, dup]);

        // Level only, every state: the scope the CLI uses without --state
        let scope = [Filter::new().eq(Field::Level, Level::StateLower.as_str())];
        let report = remove_duplicates(&mut store, &[], &scope);
        assert_eq!(report.consolidated, vec!["John Smith"]);
        assert_eq!(report.outcome.deleted, 1);

        let states: Vec<_> = store.records().iter().map(|r| r.state.as_str()).collect();
        assert_eq!(states, ["VT", "TX"]);
    }
}
