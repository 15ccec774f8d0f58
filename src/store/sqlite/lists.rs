use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{json_column, opt_ts, ts, SqliteStore};
use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::store::ListStore;
use crate::types::{now, to_millis, ElectionList};

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<ElectionList> {
    Ok(ElectionList {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        filter_config: json_column(row, "filter_config")?,
        is_shared: row.get("is_shared")?,
        contact_count: row.get("contact_count")?,
        created_at: ts(row, "created_at")?,
        updated_at: ts(row, "updated_at")?,
        deleted_at: opt_ts(row, "deleted_at")?,
    })
}

fn load_list(conn: &Connection, account_id: &str, list_id: &str) -> rusqlite::Result<Option<ElectionList>> {
    conn.query_row(
        "SELECT * FROM election_lists WHERE id = ?1 AND account_id = ?2 AND deleted_at IS NULL",
        params![list_id, account_id],
        list_from_row,
    )
    .optional()
}

#[async_trait]
impl ListStore for SqliteStore {
    async fn save_list(&self, list: &ElectionList) -> StoreResult<ElectionList> {
        let filter_json = serde_json::to_string(&list.filter_config)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO election_lists
                 (id, account_id, user_id, name, description, filter_config, is_shared,
                  contact_count, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL)
                 ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    name = excluded.name,
                    description = excluded.description,
                    filter_config = excluded.filter_config,
                    is_shared = excluded.is_shared,
                    contact_count = excluded.contact_count,
                    updated_at = excluded.updated_at,
                    deleted_at = NULL
                 WHERE election_lists.account_id = excluded.account_id",
                params![
                    list.id,
                    list.account_id,
                    list.user_id,
                    list.name,
                    list.description,
                    filter_json,
                    list.is_shared,
                    list.contact_count,
                    to_millis(&list.created_at),
                    to_millis(&list.updated_at),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::validation(
                    ValidationCode::InvalidListId,
                    format!("list id '{}' belongs to another account", list.id),
                ));
            }

            let stored = load_list(conn, &list.account_id, &list.id)?.ok_or_else(|| {
                StoreError::Database(format!("list {} missing after save", list.id))
            })?;
            log::info!("✅ Saved list {} for account {}", stored.id, stored.account_id);
            Ok(stored)
        })
    }

    async fn get_list(&self, account_id: &str, list_id: &str) -> StoreResult<Option<ElectionList>> {
        self.with_conn(|conn| Ok(load_list(conn, account_id, list_id)?))
    }

    async fn get_lists(&self, account_id: &str, user_id: Option<&str>) -> StoreResult<Vec<ElectionList>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM election_lists
                 WHERE account_id = ?1 AND deleted_at IS NULL
                   AND (is_shared = 1 OR (?2 IS NOT NULL AND user_id = ?2))
                 ORDER BY created_at DESC, id ASC",
            )?;
            let rows = stmt.query_map(params![account_id, user_id], list_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    async fn delete_list(&self, account_id: &str, list_id: &str) -> StoreResult<bool> {
        let deleted_at = to_millis(&now());
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE election_lists SET deleted_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND account_id = ?3 AND deleted_at IS NULL",
                params![deleted_at, list_id, account_id],
            )?;
            Ok(changed > 0)
        })
    }

    async fn update_list_count(
        &self,
        account_id: &str,
        list_id: &str,
        contact_count: i64,
    ) -> StoreResult<Option<ElectionList>> {
        let updated_at = to_millis(&now());
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE election_lists SET contact_count = ?1, updated_at = ?2
                 WHERE id = ?3 AND account_id = ?4 AND deleted_at IS NULL",
                params![contact_count, updated_at, list_id, account_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            Ok(load_list(conn, account_id, list_id)?)
        })
    }
}
