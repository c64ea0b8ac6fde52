//! Key-value persistence the tab engine reads and writes through.
//!
//! Course options are keyed by `(course_id, name)`; user preferences by `(user_id, name)`.
//! Every write is a single-row upsert, so each record is updated atomically; nothing here
//! spans records.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};

use crate::error::EngineResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRecord {
    pub id: i64,
    pub name: String,
    pub value: String,
}

pub trait OptionStore {
    fn load_all(&self, course_id: i64) -> EngineResult<BTreeMap<String, String>>;

    fn get(&self, course_id: i64, name: &str) -> EngineResult<Option<OptionRecord>>;

    /// Insert or overwrite; returns the record id.
    fn set(&self, course_id: i64, name: &str, value: &str) -> EngineResult<i64>;

    /// Returns whether a record was removed.
    fn delete(&self, course_id: i64, name: &str) -> EngineResult<bool>;
}

pub trait PreferenceStore {
    fn get_preference(&self, user_id: i64, name: &str) -> EngineResult<Option<String>>;

    fn set_preference(&self, user_id: i64, name: &str, value: &str) -> EngineResult<()>;
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl OptionStore for SqliteStore<'_> {
    fn load_all(&self, course_id: i64) -> EngineResult<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM course_format_options WHERE course_id = ?")?;
        let rows = stmt
            .query_map([course_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        tracing::debug!(course_id, records = rows.len(), "loaded format options");
        Ok(rows)
    }

    fn get(&self, course_id: i64, name: &str) -> EngineResult<Option<OptionRecord>> {
        let rec = self
            .conn
            .query_row(
                "SELECT id, name, value FROM course_format_options WHERE course_id = ? AND name = ?",
                (course_id, name),
                |row| {
                    Ok(OptionRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        value: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    fn set(&self, course_id: i64, name: &str, value: &str) -> EngineResult<i64> {
        let id = self.conn.query_row(
            "INSERT INTO course_format_options(course_id, name, value) VALUES(?, ?, ?)
             ON CONFLICT(course_id, name) DO UPDATE SET value = excluded.value
             RETURNING id",
            (course_id, name, value),
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn delete(&self, course_id: i64, name: &str) -> EngineResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM course_format_options WHERE course_id = ? AND name = ?",
            (course_id, name),
        )?;
        Ok(n > 0)
    }
}

impl PreferenceStore for SqliteStore<'_> {
    fn get_preference(&self, user_id: i64, name: &str) -> EngineResult<Option<String>> {
        let v = self
            .conn
            .query_row(
                "SELECT value FROM user_preferences WHERE user_id = ? AND name = ?",
                (user_id, name),
                |row| row.get(0),
            )
            .optional()?;
        Ok(v)
    }

    fn set_preference(&self, user_id: i64, name: &str, value: &str) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO user_preferences(user_id, name, value) VALUES(?, ?, ?)
             ON CONFLICT(user_id, name) DO UPDATE SET value = excluded.value",
            (user_id, name, value),
        )?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        db::init_schema(&conn).expect("init schema");
        conn
    }

    #[test]
    fn upsert_keeps_record_id_stable() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        let first = store.set(7, "tab1_title", "Week 1").expect("insert");
        let second = store.set(7, "tab1_title", "Week One").expect("update");
        assert_eq!(first, second);
        let rec = store.get(7, "tab1_title").expect("get").expect("record");
        assert_eq!(rec.value, "Week One");
    }

    #[test]
    fn options_are_scoped_per_course() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        store.set(1, "tab_seq", "tab1,tab0").expect("set");
        store.set(2, "tab_seq", "tab0").expect("set");
        let all = store.load_all(1).expect("load");
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("tab_seq").map(String::as_str), Some("tab1,tab0"));
        assert!(store.delete(2, "tab_seq").expect("delete"));
        assert!(store.get(2, "tab_seq").expect("get").is_none());
    }

    #[test]
    fn preferences_roundtrip_per_user() {
        let conn = mem_conn();
        let store = SqliteStore::new(&conn);
        store
            .set_preference(3, "toggle_seq_9", "{\"12\":\"1\"}")
            .expect("set pref");
        assert_eq!(
            store.get_preference(3, "toggle_seq_9").expect("get pref").as_deref(),
            Some("{\"12\":\"1\"}")
        );
        assert_eq!(store.get_preference(4, "toggle_seq_9").expect("get pref"), None);
    }
}
