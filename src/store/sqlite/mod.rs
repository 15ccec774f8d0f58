//! SQLite implementation of every store component

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{StoreError, StoreResult};
use crate::sqlite_pragma::apply_optimized_pragmas;
use crate::types::from_millis;
use chrono::{DateTime, Utc};

mod audit;
mod contacts;
mod interactions;
mod lists;
pub mod schema;
mod voted;

/// Relational backend
///
/// One connection shared behind a mutex; each call holds the lock for the
/// duration of its statements only.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database, apply pragmas and schema
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = db_path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        apply_optimized_pragmas(&conn)?;
        schema::apply_schema(&conn)?;

        log::info!("✅ SQLite store initialized: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Database("SQLite connection lock poisoned".to_string()))?;
        f(&mut conn)
    }
}

/// Millis column -> timestamp
pub(crate) fn ts(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    Ok(from_millis(row.get::<_, i64>(column)?))
}

pub(crate) fn opt_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<i64>>(column)?.map(from_millis))
}

/// JSON text column -> value
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// '' <-> None for the turnout key columns
pub(crate) fn empty_as_none(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// SQLite LIMIT for a resolved page size
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("scrutineer.db");
        SqliteStore::open(&db_path).unwrap();
        assert!(db_path.exists());

        // Reopen over an existing schema
        SqliteStore::open(&db_path).unwrap();
    }
}
