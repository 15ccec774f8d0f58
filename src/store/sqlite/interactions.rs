use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Row};
use std::collections::HashMap;

use super::{json_column, opt_ts, sql_limit, ts, SqliteStore};
use crate::error::StoreResult;
use crate::store::{
    InteractionBreakdown, InteractionFilter, InteractionStatistics, InteractionStore,
    InteractionTotals, SupportSummary,
};
use crate::support::SupportCategory;
use crate::types::{now, to_millis, Interaction, InteractionMethod, InteractionType, NewInteraction, Page};

/// Mean of non-null scores, rounded half away from zero
const AVG_SCORE: &str = "CAST(ROUND(AVG(support_likelihood)) AS INTEGER)";

fn bad_enum(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unknown enum value '{}'", value).into(),
    )
}

fn interaction_type(row: &Row<'_>, column: &str) -> rusqlite::Result<InteractionType> {
    let raw: String = row.get(column)?;
    InteractionType::parse(&raw).ok_or_else(|| bad_enum(0, &raw))
}

fn interaction_method(row: &Row<'_>, column: &str) -> rusqlite::Result<InteractionMethod> {
    let raw: String = row.get(column)?;
    InteractionMethod::parse(&raw).ok_or_else(|| bad_enum(0, &raw))
}

fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    Ok(Interaction {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        contact_id: row.get("contact_id")?,
        user_id: row.get("user_id")?,
        interaction_type: interaction_type(row, "interaction_type")?,
        interaction_method: interaction_method(row, "interaction_method")?,
        support_likelihood: row.get("support_likelihood")?,
        notes: row.get("notes")?,
        metadata: json_column(row, "metadata")?,
        created_at: ts(row, "created_at")?,
    })
}

fn date_predicate(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    sql: &mut String,
    bind: &mut Vec<Value>,
) {
    if let Some(start) = start {
        sql.push_str(" AND created_at >= ?");
        bind.push(Value::Integer(to_millis(&start)));
    }
    if let Some(end) = end {
        sql.push_str(" AND created_at <= ?");
        bind.push(Value::Integer(to_millis(&end)));
    }
}

#[async_trait]
impl InteractionStore for SqliteStore {
    async fn append_interaction(&self, new: &NewInteraction) -> StoreResult<Interaction> {
        let metadata = serde_json::to_string(&new.metadata)?;
        let created_at = to_millis(&now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO interactions
                 (account_id, contact_id, user_id, interaction_type, interaction_method,
                  support_likelihood, notes, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.account_id,
                    new.contact_id,
                    new.user_id,
                    new.interaction_type.as_str(),
                    new.interaction_method.as_str(),
                    new.support_likelihood,
                    new.notes,
                    metadata,
                    created_at,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(conn.query_row(
                "SELECT * FROM interactions WHERE id = ?1",
                params![id],
                interaction_from_row,
            )?)
        })
    }

    async fn interactions(&self, account_id: &str, filter: &InteractionFilter) -> StoreResult<Page<Interaction>> {
        let mut predicate = String::new();
        let mut bind = vec![Value::Text(account_id.to_string())];
        if let Some(contact_id) = &filter.contact_id {
            predicate.push_str(" AND contact_id = ?");
            bind.push(Value::Text(contact_id.clone()));
        }
        if let Some(kind) = filter.interaction_type {
            predicate.push_str(" AND interaction_type = ?");
            bind.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(method) = filter.interaction_method {
            predicate.push_str(" AND interaction_method = ?");
            bind.push(Value::Text(method.as_str().to_string()));
        }
        date_predicate(filter.start_date, filter.end_date, &mut predicate, &mut bind);

        let limit = filter.limit.unwrap_or(usize::MAX);
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM interactions WHERE account_id = ?{}", predicate),
                params_from_iter(bind.iter()),
                |row| row.get(0),
            )?;

            let mut page_bind = bind.clone();
            page_bind.push(Value::Integer(sql_limit(limit)));
            page_bind.push(Value::Integer(sql_limit(filter.offset)));
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM interactions WHERE account_id = ?{}
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                predicate
            ))?;
            let rows = stmt.query_map(params_from_iter(page_bind.iter()), interaction_from_row)?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, total, limit, filter.offset))
        })
    }

    async fn support_summary(&self, account_id: &str, contact_id: &str) -> StoreResult<SupportSummary> {
        self.with_conn(|conn| {
            let summary = conn.query_row(
                &format!(
                    "SELECT {} AS average_score,
                            COUNT(*) AS interaction_count,
                            MAX(created_at) AS last_interaction_at,
                            MAX(support_likelihood) AS highest_score,
                            MIN(support_likelihood) AS lowest_score
                     FROM interactions
                     WHERE account_id = ?1 AND contact_id = ?2 AND support_likelihood IS NOT NULL",
                    AVG_SCORE
                ),
                params![account_id, contact_id],
                |row| {
                    let average_score: Option<i64> = row.get("average_score")?;
                    Ok(SupportSummary {
                        average_score,
                        interaction_count: row.get("interaction_count")?,
                        last_interaction_at: opt_ts(row, "last_interaction_at")?,
                        highest_score: row.get("highest_score")?,
                        lowest_score: row.get("lowest_score")?,
                        support_category: SupportCategory::from_optional_score(average_score),
                    })
                },
            )?;
            Ok(summary)
        })
    }

    async fn average_scores(&self, account_id: &str, contact_ids: &[String]) -> StoreResult<HashMap<String, i64>> {
        if contact_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut bind = vec![Value::Text(account_id.to_string())];
        bind.extend(contact_ids.iter().map(|id| Value::Text(id.clone())));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT contact_id, {} AS avg_score
                 FROM interactions
                 WHERE account_id = ? AND contact_id IN ({}) AND support_likelihood IS NOT NULL
                 GROUP BY contact_id",
                AVG_SCORE,
                vec!["?"; contact_ids.len()].join(", ")
            ))?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
        })
    }

    async fn interaction_statistics(
        &self,
        account_id: &str,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> StoreResult<InteractionStatistics> {
        let mut predicate = String::new();
        let mut bind = vec![Value::Text(account_id.to_string())];
        date_predicate(start_date, end_date, &mut predicate, &mut bind);

        self.with_conn(|conn| {
            let overall = conn.query_row(
                &format!(
                    "SELECT COUNT(*), COUNT(DISTINCT contact_id), {}
                     FROM interactions WHERE account_id = ?{}",
                    AVG_SCORE, predicate
                ),
                params_from_iter(bind.iter()),
                |row| {
                    Ok(InteractionTotals {
                        total_interactions: row.get(0)?,
                        unique_contacts: row.get(1)?,
                        average_support_score: row.get(2)?,
                    })
                },
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT interaction_type, interaction_method,
                        COUNT(*) AS interaction_count,
                        COUNT(DISTINCT contact_id) AS unique_contacts,
                        COUNT(DISTINCT user_id) AS unique_users,
                        {} AS average_support_score
                 FROM interactions WHERE account_id = ?{}
                 GROUP BY interaction_type, interaction_method
                 ORDER BY interaction_count DESC, interaction_type ASC, interaction_method ASC",
                AVG_SCORE, predicate
            ))?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
                Ok(InteractionBreakdown {
                    interaction_type: interaction_type(row, "interaction_type")?,
                    interaction_method: interaction_method(row, "interaction_method")?,
                    count: row.get("interaction_count")?,
                    unique_contacts: row.get("unique_contacts")?,
                    unique_users: row.get("unique_users")?,
                    average_support_score: row.get("average_support_score")?,
                })
            })?;
            let by_type = rows.collect::<Result<Vec<_>, _>>()?;

            Ok(InteractionStatistics { overall, by_type })
        })
    }
}
