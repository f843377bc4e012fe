use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

use seatkeeper_recon::audit::{audit, audit_scope};
use seatkeeper_recon::consolidate::remove_duplicates;
use seatkeeper_recon::model::{scope_filters, Email, Phone};
use seatkeeper_recon::pipeline::{delete_listed, insert};
use seatkeeper_recon::{
    import_records, DistrictRegistry, EngineConfig, Field, Filter, ImportOptions, Level, LegislatorRecord,
    MemoryStore, MergeDecision, ReconError, RecordStore, ResolutionOutcome, ScriptedOracle, TabularSource,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn registry() -> DistrictRegistry {
    DistrictRegistry::from_csv_str(&fixture("districts.csv")).unwrap()
}

fn source(name: &str) -> TabularSource {
    TabularSource::from_csv_str(&fixture(name)).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 6, 9, 0, 0).unwrap()
}

// -------------------------------------------------------------------------
// Reference data
// -------------------------------------------------------------------------

#[test]
fn reference_lists_are_deduplicated_and_mix_sorted() {
    let registry = registry();
    assert_eq!(registry.districts_for(Level::FedLower, "AL"), ["1", "2", "3", "4", "5", "6", "7"]);
    let vt = registry.districts_for(Level::StateLower, "VT");
    assert_eq!(vt.len(), 7);
    assert_eq!(vt.first().map(String::as_str), Some("Addison-1"));
    assert_eq!(vt.last().map(String::as_str), Some("Windsor-1"));
}

// -------------------------------------------------------------------------
// Import → merge → template → insert
// -------------------------------------------------------------------------

#[test]
fn lone_candidate_in_empty_scope_is_accepted_and_inserted_bare() {
    let mut store = MemoryStore::with_records(
        "dest",
        vec![LegislatorRecord::new(Level::FedLower, "AL", "Someone Else").with_district("1")],
    );
    let mut oracle = ScriptedOracle::default();
    let batch = import_records(&source("ohio-single.csv"), &registry(), &store, &mut oracle, ImportOptions::default())
        .unwrap();
    let expected = batch.records[0].clone();

    let report = insert(batch, &mut store, &mut oracle, &EngineConfig::default(), true, now());
    assert_eq!(report.decisions, vec![MergeDecision::Accept]);
    assert_eq!(report.outcome.inserted, 1);
    assert!(oracle.asked.is_empty());

    let stored = store.find(&Filter::scope(Level::StateUpper, "OH")).unwrap();
    assert_eq!(stored.len(), 1);
    let mut bare = stored[0].clone();
    bare.id = None;
    assert_eq!(bare, expected, "no template fields on a lone candidate");
}

#[test]
fn sibling_candidates_are_templated_from_a_peer() {
    let mut peer = LegislatorRecord::new(Level::StateUpper, "OH", "Lee Ray").with_district("7");
    peer.title = "Senator".into();
    peer.country = Some("us".into());
    peer.emails.push(Email { address: "lee@ohio.gov".into() });
    peer.needs_review = true;
    let mut store = MemoryStore::with_records("dest", vec![peer]);

    // Both new names are offered the lone peer; "none of them" admits them.
    let mut oracle = ScriptedOracle::new([ResolutionOutcome::Reject, ResolutionOutcome::Reject]);
    let batch =
        import_records(&source("ohio-pair.csv"), &registry(), &store, &mut oracle, ImportOptions::default()).unwrap();
    let report = insert(batch, &mut store, &mut oracle, &EngineConfig::default(), true, now());

    assert_eq!(oracle.asked.len(), 2);
    assert_eq!(oracle.asked[0].2, vec!["Lee Ray"]);
    assert_eq!(report.outcome.inserted, 2);

    let pat = store.find(&Filter::new().eq(Field::Name, "Pat Kim")).unwrap().remove(0);
    assert_eq!(pat.district.as_deref(), Some("5"));
    assert_eq!(pat.title, "Senator");
    assert_eq!(pat.country.as_deref(), Some("us"));
    assert!(pat.emails.is_empty());
    assert!(!pat.needs_review);
    assert_eq!(pat.date_added, Some(now()));
}

#[test]
fn district_labels_are_corrected_and_blanks_removed() {
    let store = MemoryStore::new("dest");
    let mut oracle = ScriptedOracle::default();
    let batch = import_records(&source("vermont-house.csv"), &registry(), &store, &mut oracle, ImportOptions::default())
        .unwrap();

    assert!(oracle.asked.is_empty());
    assert_eq!(batch.corrections.len(), 1);
    assert_eq!(batch.corrections[0].to, "Bennington-1");
    assert_eq!(batch.records[0].district.as_deref(), Some("Bennington-1"));
    assert_eq!(
        batch.records[1].phones,
        vec![Phone { number: "802-555-0102".into() }, Phone { number: "802-555-0103".into() }]
    );
    assert_eq!(batch.records[2].district, None);
    assert!(batch.records[2].phones.is_empty());
}

#[test]
fn bad_row_aborts_before_any_write() {
    let store = MemoryStore::new("dest");
    let err = import_records(
        &source("bad-state.csv"),
        &registry(),
        &store,
        &mut ScriptedOracle::default(),
        ImportOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReconError::Validation { .. }));
    assert_eq!(err.to_string(), "bad state on row 2");
    assert!(store.is_empty());
}

#[test]
fn pending_resolutions_never_reach_the_store() {
    let mut store = MemoryStore::new("dest");
    let data = "level,state,district,name\n\
                state-lower,VT,Chitt,Ann Bo\n\
                state-lower,VT,Addison-1,Cy Dee\n";
    let mut oracle = ScriptedOracle::new([ResolutionOutcome::Reject]);
    let batch = import_records(
        &TabularSource::from_csv_str(data).unwrap(),
        &registry(),
        &store,
        &mut oracle,
        ImportOptions::default(),
    )
    .unwrap();
    assert_eq!(batch.pending.len(), 1);

    let report = insert(batch, &mut store, &mut oracle, &EngineConfig::default(), false, now());
    assert_eq!(report.pending, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.records()[0].name, "Cy Dee");
}

// -------------------------------------------------------------------------
// Delete list with name resolution
// -------------------------------------------------------------------------

#[test]
fn delete_list_resolves_names_against_store() {
    let mut store = MemoryStore::with_records(
        "dest",
        vec![
            LegislatorRecord::new(Level::FedUpper, "AL", "Jane Doe"),
            LegislatorRecord::new(Level::FedUpper, "AL", "Bob Roe"),
            LegislatorRecord::new(Level::FedUpper, "AK", "Jane Doe"),
        ],
    );
    let batch = import_records(
        &source("delete-list.csv"),
        &registry(),
        &store,
        &mut ScriptedOracle::default(),
        ImportOptions::default(),
    )
    .unwrap();
    let outcome = delete_listed(&batch, &mut store);
    assert_eq!(outcome.deleted, 2);
    assert_eq!(store.len(), 1);
    assert_eq!(store.records()[0].state, "AK");
}

// -------------------------------------------------------------------------
// Maintenance
// -------------------------------------------------------------------------

#[test]
fn senate_audit_reports_lone_senator() {
    let store = MemoryStore::with_records("dest", vec![LegislatorRecord::new(Level::FedUpper, "AL", "Jane Doe")]);
    let scope = audit_scope(Level::FedUpper, "AL", &registry(), &store);
    assert_eq!(scope.findings.len(), 1);
    assert_eq!(scope.findings[0].to_string(), "Alabama (1/2): Jane Doe");

    let states = vec!["AL".to_string()];
    let report = audit(&[Level::FedUpper], Some(&states), &registry(), &store);
    assert_eq!(report.to_string(), "United States Senate\nAlabama (1/2): Jane Doe\n");
}

#[test]
fn consolidation_across_collections_is_idempotent() {
    let mut a = LegislatorRecord::new(Level::StateLower, "VT", "Ann Bo").with_district("Addison-1");
    a.emails = vec![Email { address: "a@x".into() }];
    let mut b = a.clone();
    b.emails = vec![Email { address: "a@x".into() }, Email { address: "b@x".into() }];
    let mut local = MemoryStore::with_records("local", vec![a, b]);

    let mut archived = LegislatorRecord::new(Level::StateLower, "VT", "Ann Bo").with_district("Addison-1");
    archived.audio_path = "ann.mp3".into();
    let archive = MemoryStore::with_records("archive", vec![archived]);

    let scope = [Filter::scope(Level::StateLower, "VT")];
    let first = remove_duplicates(&mut local, &[&archive], &scope);
    assert_eq!(first.consolidated, vec!["Ann Bo"]);
    assert_eq!(local.len(), 1);
    let kept = &local.records()[0];
    let addresses: Vec<_> = kept.emails.iter().map(|e| e.address.as_str()).collect();
    assert_eq!(addresses, ["a@x", "b@x"]);
    assert_eq!(kept.audio_path, "ann.mp3");

    let second = remove_duplicates(&mut local, &[&archive], &scope);
    assert!(second.consolidated.is_empty());
    assert_eq!(second.outcome.modified, 0);
}

#[test]
fn consolidation_over_wide_scope_only_removes_true_duplicates() {
    let mut rep = LegislatorRecord::new(Level::FedLower, "AL", "Jo Park").with_district("2");
    rep.phones = vec![Phone { number: "111".into() }];
    let mut senator = LegislatorRecord::new(Level::FedUpper, "AL", "Jo Park");
    senator.phones = vec![Phone { number: "222".into() }];
    let vermont = LegislatorRecord::new(Level::StateLower, "VT", "John Smith").with_district("Addison-1");
    let texas = LegislatorRecord::new(Level::StateLower, "TX", "John Smith").with_district("12");
    let mut vermont_again = vermont.clone();
    vermont_again.emails = vec![Email { address: "js@vt".into() }];
    let mut local = MemoryStore::with_records("local", vec![rep, senator, vermont, texas, vermont_again]);

    // Every level, every state
    let scope = scope_filters(&Level::ALL, None);
    let report = remove_duplicates(&mut local, &[], &scope);
    assert_eq!(report.consolidated, vec!["John Smith"]);
    assert_eq!(report.outcome.deleted, 1);
    assert_eq!(local.len(), 4);

    let phones = |level: Level| {
        let found = local.find(&Filter::new().eq(Field::Level, level.as_str())).unwrap();
        found[0].phones.iter().map(|p| p.number.clone()).collect::<Vec<_>>()
    };
    assert_eq!(phones(Level::FedLower), ["111"]);
    assert_eq!(phones(Level::FedUpper), ["222"]);

    let smiths = local.find(&Filter::new().eq(Field::Name, "John Smith")).unwrap();
    let states: Vec<_> = smiths.iter().map(|r| r.state.as_str()).collect();
    assert_eq!(states, ["VT", "TX"]);
    assert_eq!(smiths[0].emails, vec![Email { address: "js@vt".into() }]);
}
