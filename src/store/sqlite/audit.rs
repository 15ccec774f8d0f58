use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{empty_as_none, json_column, sql_limit, ts, SqliteStore};
use crate::error::{StoreError, StoreResult};
use crate::store::{AuditStore, VoteMarkFilter};
use crate::types::{now, to_millis, Page, PollKey, PollTurnout, VoteMark};

fn vote_mark_from_row(row: &Row<'_>) -> rusqlite::Result<VoteMark> {
    Ok(VoteMark {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        contact_id: row.get("contact_id")?,
        poll_number: row.get("poll_number")?,
        riding: row.get("riding")?,
        province: row.get("province")?,
        marked_by: row.get("marked_by")?,
        verification_code: row.get("verification_code")?,
        notes: row.get("notes")?,
        metadata: json_column(row, "metadata")?,
        marked_at: ts(row, "marked_at")?,
    })
}

fn turnout_from_row(row: &Row<'_>) -> rusqlite::Result<PollTurnout> {
    Ok(PollTurnout {
        account_id: row.get("account_id")?,
        poll_number: row.get("poll_number")?,
        riding: empty_as_none(row.get("riding")?),
        province: empty_as_none(row.get("province")?),
        total_voters: row.get("total_voters")?,
        votes_cast: row.get("votes_cast")?,
        updated_by: row.get("updated_by")?,
        last_updated_at: ts(row, "last_updated_at")?,
    })
}

fn load_turnout(conn: &Connection, account_id: &str, key: &PollKey) -> StoreResult<PollTurnout> {
    let row = conn
        .query_row(
            "SELECT * FROM poll_turnout
             WHERE account_id = ?1 AND poll_number = ?2 AND riding = ?3 AND province = ?4",
            params![
                account_id,
                key.poll_number,
                key.riding_or_empty(),
                key.province_or_empty()
            ],
            turnout_from_row,
        )
        .optional()?;
    row.ok_or_else(|| {
        StoreError::Database(format!(
            "turnout row for poll {} missing after write",
            key.poll_number
        ))
    })
}

/// Filter -> `WHERE` suffix + params (after the account id)
fn vote_mark_predicate(filter: &VoteMarkFilter) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut bind = Vec::new();
    let mut eq = |column: &str, value: &Option<String>| {
        if let Some(v) = value {
            sql.push_str(&format!(" AND {} = ?", column));
            bind.push(Value::Text(v.clone()));
        }
    };
    eq("poll_number", &filter.poll_number);
    eq("riding", &filter.riding);
    eq("province", &filter.province);
    eq("marked_by", &filter.marked_by);

    if let Some(start) = &filter.start_date {
        sql.push_str(" AND marked_at >= ?");
        bind.push(Value::Integer(to_millis(start)));
    }
    if let Some(end) = &filter.end_date {
        sql.push_str(" AND marked_at <= ?");
        bind.push(Value::Integer(to_millis(end)));
    }
    if let Some(search) = &filter.contact_search {
        sql.push_str(" AND instr(lower(contact_id), lower(?)) > 0");
        bind.push(Value::Text(search.clone()));
    }
    (sql, bind)
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn record_vote(&self, mark: &VoteMark) -> StoreResult<PollTurnout> {
        let metadata = serde_json::to_string(&mark.metadata)?;
        let key = PollKey::new(
            mark.poll_number.clone(),
            mark.riding.as_deref(),
            mark.province.as_deref(),
        );
        let marked_at = to_millis(&mark.marked_at);

        self.with_conn(|conn| {
            // Append and increment commit together on this backend
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO vote_marks
                 (id, account_id, contact_id, poll_number, riding, province, marked_by,
                  verification_code, notes, metadata, marked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    mark.id,
                    mark.account_id,
                    mark.contact_id,
                    mark.poll_number,
                    mark.riding,
                    mark.province,
                    mark.marked_by,
                    mark.verification_code,
                    mark.notes,
                    metadata,
                    marked_at,
                ],
            )?;
            tx.execute(
                "INSERT INTO poll_turnout
                 (account_id, poll_number, riding, province, total_voters, votes_cast, updated_by, last_updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?6)
                 ON CONFLICT(account_id, poll_number, riding, province) DO UPDATE SET
                    votes_cast = votes_cast + 1,
                    updated_by = excluded.updated_by,
                    last_updated_at = excluded.last_updated_at",
                params![
                    mark.account_id,
                    key.poll_number,
                    key.riding_or_empty(),
                    key.province_or_empty(),
                    mark.marked_by,
                    marked_at,
                ],
            )?;
            let turnout = load_turnout(&tx, &mark.account_id, &key)?;
            tx.commit()?;
            Ok(turnout)
        })
    }

    async fn set_total_voters(
        &self,
        account_id: &str,
        key: &PollKey,
        total_voters: i64,
        updated_by: Option<&str>,
    ) -> StoreResult<PollTurnout> {
        let updated_at = to_millis(&now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO poll_turnout
                 (account_id, poll_number, riding, province, total_voters, votes_cast, updated_by, last_updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)
                 ON CONFLICT(account_id, poll_number, riding, province) DO UPDATE SET
                    total_voters = excluded.total_voters,
                    updated_by = excluded.updated_by,
                    last_updated_at = excluded.last_updated_at",
                params![
                    account_id,
                    key.poll_number,
                    key.riding_or_empty(),
                    key.province_or_empty(),
                    total_voters,
                    updated_by,
                    updated_at,
                ],
            )?;
            load_turnout(conn, account_id, key)
        })
    }

    async fn vote_marks(&self, account_id: &str, filter: &VoteMarkFilter) -> StoreResult<Page<VoteMark>> {
        let (predicate, extra) = vote_mark_predicate(filter);
        let mut bind = vec![Value::Text(account_id.to_string())];
        bind.extend(extra);

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM vote_marks WHERE account_id = ?{}", predicate),
                params_from_iter(bind.iter()),
                |row| row.get(0),
            )?;

            let mut page_bind = bind.clone();
            page_bind.push(Value::Integer(sql_limit(filter.limit)));
            page_bind.push(Value::Integer(sql_limit(filter.offset)));
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM vote_marks WHERE account_id = ?{}
                 ORDER BY marked_at DESC, seq DESC LIMIT ? OFFSET ?",
                predicate
            ))?;
            let rows = stmt.query_map(params_from_iter(page_bind.iter()), vote_mark_from_row)?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;

            Ok(Page::new(items, total, filter.limit, filter.offset))
        })
    }

    async fn find_vote_mark(&self, account_id: &str, code: &str) -> StoreResult<Option<VoteMark>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM vote_marks WHERE account_id = ?1 AND verification_code = ?2",
                    params![account_id, code],
                    vote_mark_from_row,
                )
                .optional()?)
        })
    }

    async fn poll_turnout(&self, account_id: &str) -> StoreResult<Vec<PollTurnout>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM poll_turnout WHERE account_id = ?1
                 ORDER BY poll_number ASC, riding ASC, province ASC",
            )?;
            let rows = stmt.query_map(params![account_id], turnout_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}
