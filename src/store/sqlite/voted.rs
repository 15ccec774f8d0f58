use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use super::{ts, SqliteStore};
use crate::error::{StoreError, StoreResult};
use crate::store::VotedStore;
use crate::types::{now, to_millis, VotedEntry};

#[async_trait]
impl VotedStore for SqliteStore {
    async fn set_voted(&self, account_id: &str, contact_id: &str, marked_by: Option<&str>) -> StoreResult<VotedEntry> {
        let voted_at = to_millis(&now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO voted_tally (account_id, contact_id, voted_at, marked_by)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(account_id, contact_id) DO UPDATE SET
                    voted_at = excluded.voted_at,
                    marked_by = excluded.marked_by",
                params![account_id, contact_id, voted_at, marked_by],
            )?;
            let entry = conn
                .query_row(
                    "SELECT * FROM voted_tally WHERE account_id = ?1 AND contact_id = ?2",
                    params![account_id, contact_id],
                    |row| {
                        Ok(VotedEntry {
                            account_id: row.get("account_id")?,
                            contact_id: row.get("contact_id")?,
                            voted_at: ts(row, "voted_at")?,
                            marked_by: row.get("marked_by")?,
                        })
                    },
                )
                .optional()?;
            entry.ok_or_else(|| StoreError::Database("voted entry missing after write".to_string()))
        })
    }

    async fn unset_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM voted_tally WHERE account_id = ?1 AND contact_id = ?2",
                params![account_id, contact_id],
            )?;
            Ok(removed > 0)
        })
    }

    async fn clear_all_voted(&self, account_id: &str) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM voted_tally WHERE account_id = ?1",
                params![account_id],
            )?;
            log::info!("🧹 Cleared {} voted entries for account {}", removed, account_id);
            Ok(removed)
        })
    }

    async fn is_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM voted_tally WHERE account_id = ?1 AND contact_id = ?2",
                    params![account_id, contact_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    async fn voted_contact_ids(&self, account_id: &str) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT contact_id FROM voted_tally WHERE account_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(params![account_id], |row| row.get(0))?;
            Ok(rows.collect::<Result<Vec<String>, _>>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_voted_flags() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();

        store.set_voted("acct", "c1", Some("u1")).await.unwrap();
        store.set_voted("acct", "c2", None).await.unwrap();
        let again = store.set_voted("acct", "c1", Some("u2")).await.unwrap();
        assert_eq!(again.marked_by.as_deref(), Some("u2"));

        assert_eq!(store.voted_contact_ids("acct").await.unwrap(), vec!["c1", "c2"]);
        assert!(store.is_voted("acct", "c2").await.unwrap());

        assert!(store.unset_voted("acct", "c2").await.unwrap());
        assert!(!store.unset_voted("acct", "c2").await.unwrap());
        assert_eq!(store.clear_all_voted("acct").await.unwrap(), 1);
        assert!(store.voted_contact_ids("acct").await.unwrap().is_empty());
    }
}
