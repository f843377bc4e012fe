// SQLite-backed document store
//
// One file per named store. Documents are kept as JSON text keyed by `_id`,
// with `level` and `state` mirrored into indexed columns so scoped reads only
// decode their own rows. Filters are evaluated on the decoded record, in
// insertion order.

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

use seatkeeper_recon::model::{Field, Filter, LegislatorRecord, WriteOutcome};
use seatkeeper_recon::store::apply_update;
use seatkeeper_recon::{ReconError, RecordStore};

use crate::STORE_FORMAT_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS legislators (
    id TEXT PRIMARY KEY,
    level TEXT,                     -- copies of the document's scope fields
    state TEXT,
    doc TEXT NOT NULL               -- JSON document without `_id`
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

// Created after any upgrade, since format 1 tables lack the columns.
const INDEXES: &str = "CREATE INDEX IF NOT EXISTS legislators_scope ON legislators (level, state);";

/// Format 1 stored documents only.
fn upgrade_from_v1(name: &str, conn: &Connection) -> Result<(), ReconError> {
    log::info!("{name}: upgrading store format 1 to {STORE_FORMAT_VERSION}");
    conn.execute_batch(&format!(
        "BEGIN;
         ALTER TABLE legislators ADD COLUMN level TEXT;
         ALTER TABLE legislators ADD COLUMN state TEXT;
         UPDATE legislators
            SET level = json_extract(doc, '$.level'), state = json_extract(doc, '$.state')
          WHERE json_valid(doc);
         UPDATE meta SET value = '{STORE_FORMAT_VERSION}' WHERE key = 'format_version';
         COMMIT;"
    ))
    .map_err(|e| ReconError::Store(format!("{name}: upgrade failed: {e}")))
}

pub struct SqliteStore {
    name: String,
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the store file at `path`.
    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self, ReconError> {
        let conn = Connection::open(path).map_err(|e| ReconError::Store(format!("{}: {e}", path.display())))?;
        Self::init(name.into(), conn)
    }

    pub fn open_in_memory(name: impl Into<String>) -> Result<Self, ReconError> {
        let conn = Connection::open_in_memory().map_err(|e| ReconError::Store(e.to_string()))?;
        Self::init(name.into(), conn)
    }

    fn init(name: String, conn: Connection) -> Result<Self, ReconError> {
        conn.execute_batch(SCHEMA).map_err(|e| ReconError::Store(e.to_string()))?;

        let version: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'format_version'", [], |row| row.get(0))
            .optional()
            .map_err(|e| ReconError::Store(e.to_string()))?;
        match version {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('format_version', ?1)",
                    params![STORE_FORMAT_VERSION.to_string()],
                )
                .map_err(|e| ReconError::Store(e.to_string()))?;
            }
            Some(v) => match v.parse::<u32>() {
                Ok(1) => upgrade_from_v1(&name, &conn)?,
                Ok(n) if n <= STORE_FORMAT_VERSION => {}
                _ => {
                    return Err(ReconError::Store(format!(
                        "{name}: store format {v} is newer than supported ({STORE_FORMAT_VERSION})"
                    )));
                }
            },
        }
        conn.execute_batch(INDEXES).map_err(|e| ReconError::Store(e.to_string()))?;

        Ok(Self { name, conn })
    }

    /// Decode the rows whose scope columns agree with `filter`. Documents that
    /// no longer decode are logged and skipped so one bad row cannot hide the
    /// rest of the store.
    fn load_scoped(&self, filter: &Filter) -> Result<Vec<LegislatorRecord>, ReconError> {
        let mut sql = String::from("SELECT id, doc FROM legislators");
        let mut args: Vec<&str> = Vec::new();
        for column in [Field::Level, Field::State] {
            if let Some(Value::String(v)) = filter.clauses.get(column.key()) {
                sql.push_str(if args.is_empty() { " WHERE " } else { " AND " });
                sql.push_str(column.key());
                sql.push_str(" = ?");
                args.push(v.as_str());
            }
        }
        sql.push_str(" ORDER BY rowid");

        let mut stmt = self.conn.prepare(&sql).map_err(|e| ReconError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| ReconError::Store(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, doc) = row.map_err(|e| ReconError::Store(e.to_string()))?;
            match decode(&id, &doc) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("{}: skipping unreadable document {id}: {e}", self.name),
            }
        }
        Ok(records)
    }

    fn load_one(&self, id: &str) -> Result<Option<LegislatorRecord>, ReconError> {
        let doc: Option<String> = self
            .conn
            .query_row("SELECT doc FROM legislators WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .map_err(|e| ReconError::Store(e.to_string()))?;
        doc.map(|d| decode(id, &d)).transpose()
    }
}

fn decode(id: &str, doc: &str) -> Result<LegislatorRecord, ReconError> {
    let mut value: Value =
        serde_json::from_str(doc).map_err(|e| ReconError::Store(format!("document {id}: {e}")))?;
    if let Some(map) = value.as_object_mut() {
        map.insert("_id".to_string(), Value::from(id));
    }
    LegislatorRecord::from_document(value)
}

fn encode(record: &LegislatorRecord) -> String {
    let mut doc = record.to_document();
    if let Some(map) = doc.as_object_mut() {
        map.remove("_id");
    }
    doc.to_string()
}

impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Filter) -> Result<Vec<LegislatorRecord>, ReconError> {
        let mut records = self.load_scoped(filter)?;
        records.retain(|r| filter.matches(r));
        Ok(records)
    }

    fn bulk_insert(&mut self, records: &[LegislatorRecord]) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        let tx = match self.conn.transaction() {
            Ok(tx) => tx,
            Err(e) => return WriteOutcome::failed(e.to_string()),
        };

        for record in records {
            let id = record.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            match tx.execute(
                "INSERT INTO legislators (id, level, state, doc) VALUES (?1, ?2, ?3, ?4)",
                params![id, record.level.as_str(), record.state, encode(record)],
            ) {
                Ok(_) => outcome.inserted += 1,
                Err(e) => {
                    log::warn!("{}: insert {} failed: {e}", self.name, record.name);
                    outcome.errors.push(format!("{}: {e}", record.name));
                }
            }
        }

        if let Err(e) = tx.commit() {
            outcome.errors.push(e.to_string());
            outcome.inserted = 0;
        }
        outcome
    }

    fn bulk_delete(&mut self, filters: &[Filter]) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        for filter in filters {
            let ids: Vec<String> = match self.find(filter) {
                Ok(records) => records.into_iter().filter_map(|r| r.id).collect(),
                Err(e) => {
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };
            for id in ids {
                match self.conn.execute("DELETE FROM legislators WHERE id = ?1", params![id]) {
                    Ok(n) => outcome.deleted += n,
                    Err(e) => outcome.errors.push(format!("{id}: {e}")),
                }
            }
        }
        outcome
    }

    fn update_one(&mut self, id: &str, field: Field, value: Value) -> WriteOutcome {
        let record = match self.load_one(id) {
            Ok(Some(r)) => r,
            Ok(None) => return WriteOutcome::failed(format!("no document with _id {id}")),
            Err(e) => return WriteOutcome::failed(e.to_string()),
        };
        let updated = match apply_update(&record, field, value) {
            Ok(r) => r,
            Err(e) => return WriteOutcome::failed(e.to_string()),
        };
        match self
            .conn
            .execute(
                "UPDATE legislators SET level = ?1, state = ?2, doc = ?3 WHERE id = ?4",
                params![updated.level.as_str(), updated.state, encode(&updated), id],
            )
        {
            Ok(n) => WriteOutcome { modified: n, ..WriteOutcome::default() },
            Err(e) => WriteOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatkeeper_recon::model::{Email, Level};
    use tempfile::tempdir;

    fn rep(name: &str, district: &str) -> LegislatorRecord {
        LegislatorRecord::new(Level::FedLower, "AL", name).with_district(district)
    }

    #[test]
    fn test_insert_assigns_uuid_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.db");

        {
            let mut store = SqliteStore::open("local", &path).unwrap();
            let outcome = store.bulk_insert(&[rep("A", "1"), rep("B", "2")]);
            assert_eq!(outcome.inserted, 2);
        }

        let store = SqliteStore::open("local", &path).unwrap();
        let all = store.find(&Filter::new()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "A");
        let id = all[0].id.as_deref().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_duplicate_id_is_reported_not_fatal() {
        let mut store = SqliteStore::open_in_memory("mem").unwrap();
        store.bulk_insert(&[rep("A", "1")]);
        let existing = store.find(&Filter::new()).unwrap().remove(0);

        let outcome = store.bulk_insert(&[existing, rep("B", "2")]);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(store.find(&Filter::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_filters_match_missing_district() {
        let mut store = SqliteStore::open_in_memory("mem").unwrap();
        store.bulk_insert(&[
            LegislatorRecord::new(Level::FedUpper, "AK", "Lisa M"),
            rep("A", "1"),
        ]);
        let at_large = store
            .find(&Filter::new().eq(Field::District, Value::Null))
            .unwrap();
        assert_eq!(at_large.len(), 1);
        assert_eq!(at_large[0].name, "Lisa M");
    }

    #[test]
    fn test_update_and_delete() {
        let mut store = SqliteStore::open_in_memory("mem").unwrap();
        store.bulk_insert(&[rep("A", "1"), rep("B", "2")]);
        let a = store.find(&Filter::new().eq(Field::Name, "A")).unwrap().remove(0);
        let id = a.id.clone().unwrap();

        let emails = serde_json::to_value(vec![Email { address: "a@x".into() }]).unwrap();
        assert_eq!(store.update_one(&id, Field::Emails, emails).modified, 1);
        let a = store.find(&Filter::new().eq(Field::Name, "A")).unwrap().remove(0);
        assert_eq!(a.emails[0].address, "a@x");

        assert!(!store.update_one("missing", Field::Name, Value::from("x")).is_clean());

        let outcome = store.bulk_delete(&[Filter::new().eq(Field::District, "2")]);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(store.delete_one(&id).deleted, 1);
        assert!(store.find(&Filter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_newer_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            conn.execute("INSERT INTO meta (key, value) VALUES ('format_version', '99')", []).unwrap();
        }
        assert!(SqliteStore::open("future", &path).is_err());
    }

    #[test]
    fn test_unreadable_document_is_skipped() {
        let mut store = SqliteStore::open_in_memory("mem").unwrap();
        store.bulk_insert(&[rep("A", "1")]);
        store
            .conn
            .execute(
                "INSERT INTO legislators (id, level, state, doc) VALUES ('bad', 'fed-lower', 'AL', 'not json')",
                [],
            )
            .unwrap();
        store
            .conn
            .execute(
                "INSERT INTO legislators (id, level, state, doc) VALUES ('odd', 'fed-lower', 'AL', '{\"name\": 7}')",
                [],
            )
            .unwrap();
        store.bulk_insert(&[rep("B", "2")]);

        let names: Vec<_> = store.find(&Filter::new()).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["A", "B"]);
        let scoped = store.find(&Filter::scope(Level::FedLower, "AL")).unwrap();
        assert_eq!(scoped.len(), 2);
    }

    #[test]
    fn test_scope_columns_follow_updates() {
        let mut store = SqliteStore::open_in_memory("mem").unwrap();
        store.bulk_insert(&[
            rep("A", "1"),
            LegislatorRecord::new(Level::FedLower, "TX", "B").with_district("1"),
            LegislatorRecord::new(Level::FedUpper, "AL", "C"),
        ]);

        let al_house = store.find(&Filter::scope(Level::FedLower, "AL")).unwrap();
        assert_eq!(al_house.len(), 1);
        assert_eq!(al_house[0].name, "A");
        let texas = store.find(&Filter::new().eq(Field::State, "TX")).unwrap();
        assert_eq!(texas[0].name, "B");

        // Moving a record to another state moves its indexed copy too
        let id = al_house[0].id.clone().unwrap();
        assert_eq!(store.update_one(&id, Field::State, Value::from("TX")).modified, 1);
        let texas = store.find(&Filter::new().eq(Field::State, "TX")).unwrap();
        assert_eq!(texas.len(), 2);
        assert!(store.find(&Filter::scope(Level::FedLower, "AL")).unwrap().is_empty());
    }

    #[test]
    fn test_upgrades_document_only_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE legislators (id TEXT PRIMARY KEY, doc TEXT NOT NULL);
                 CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                 INSERT INTO meta (key, value) VALUES ('format_version', '1');
                 INSERT INTO legislators (id, doc) VALUES ('bad', 'not json');",
            )
            .unwrap();
            conn.execute("INSERT INTO legislators (id, doc) VALUES ('a1', ?1)", params![encode(&rep("A", "1"))])
                .unwrap();
        }

        let store = SqliteStore::open("old", &path).unwrap();
        let found = store.find(&Filter::scope(Level::FedLower, "AL")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_deref(), Some("a1"));
        let version: String = store
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'format_version'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, STORE_FORMAT_VERSION.to_string());
        drop(store);

        // Reopening an upgraded store leaves it alone
        assert!(SqliteStore::open("old", &path).is_ok());
    }
}
