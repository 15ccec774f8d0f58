use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use super::{json_column, opt_ts, sql_limit, ts, SqliteStore};
use crate::error::StoreResult;
use crate::segment::sql::compile;
use crate::segment::{ContactQuery, FilterConfig};
use crate::store::{ContactDirectory, SegmentStore};
use crate::types::{to_millis, Contact, EnrichedContact, Page};

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        city: row.get("city")?,
        province: row.get("province")?,
        postal_code: row.get("postal_code")?,
        poll_number: row.get("poll_number")?,
        riding: row.get("riding")?,
        categories: json_column(row, "categories")?,
        category: row.get("category")?,
        custom_fields: json_column(row, "custom_fields")?,
        created_at: ts(row, "created_at")?,
        updated_at: opt_ts(row, "updated_at")?,
        deleted_at: opt_ts(row, "deleted_at")?,
        deleted: false,
    })
}

fn enriched_from_row(row: &Row<'_>) -> rusqlite::Result<EnrichedContact> {
    Ok(EnrichedContact {
        contact: contact_from_row(row)?,
        support_score: row.get("support_score")?,
        interaction_count: row.get("interaction_count")?,
        last_interaction_at: opt_ts(row, "last_interaction_at")?,
    })
}

#[async_trait]
impl ContactDirectory for SqliteStore {
    async fn account_contacts(&self, account_id: &str) -> StoreResult<Vec<Contact>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM contacts
                 WHERE account_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at DESC, id ASC",
            )?;
            let rows = stmt.query_map(params![account_id], contact_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    async fn contacts_by_ids(&self, account_id: &str, ids: &[String]) -> StoreResult<Vec<Contact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT * FROM contacts WHERE account_id = ? AND id IN ({})",
                vec!["?"; ids.len()].join(", ")
            );
            let mut bind: Vec<Value> = Vec::with_capacity(ids.len() + 1);
            bind.push(Value::Text(account_id.to_string()));
            bind.extend(ids.iter().map(|id| Value::Text(id.clone())));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), contact_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    async fn upsert_contacts(&self, account_id: &str, contacts: &[Contact]) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO contacts
                     (account_id, id, first_name, last_name, name, email, phone, address, city,
                      province, postal_code, poll_number, riding, categories, category,
                      custom_fields, created_at, updated_at, deleted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                )?;
                for c in contacts {
                    stmt.execute(params![
                        account_id,
                        c.id,
                        c.first_name,
                        c.last_name,
                        c.name,
                        c.email,
                        c.phone,
                        c.address,
                        c.city,
                        c.province,
                        c.postal_code,
                        c.poll_number,
                        c.riding,
                        serde_json::to_string(&c.categories)?,
                        c.category,
                        serde_json::to_string(&c.custom_fields)?,
                        to_millis(&c.created_at),
                        c.updated_at.as_ref().map(to_millis),
                        c.deletion_time().as_ref().map(to_millis),
                    ])?;
                }
            }
            tx.commit()?;

            log::debug!("✅ Upserted {} contacts for account {}", contacts.len(), account_id);
            Ok(contacts.len())
        })
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[async_trait]
impl SegmentStore for SqliteStore {
    async fn count_contacts(&self, account_id: &str, filter: &FilterConfig) -> StoreResult<i64> {
        let compiled = compile(account_id, filter);
        self.with_conn(|conn| {
            let count = conn.query_row(
                &compiled.count_sql(),
                params_from_iter(compiled.params.iter()),
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    async fn query_contacts(
        &self,
        account_id: &str,
        filter: &FilterConfig,
        query: &ContactQuery,
    ) -> StoreResult<Page<EnrichedContact>> {
        let compiled = compile(account_id, filter);
        let limit = query.resolved_limit(crate::config::DEFAULT_PAGE_SIZE);

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &compiled.count_sql(),
                params_from_iter(compiled.params.iter()),
                |row| row.get(0),
            )?;

            let mut bind = compiled.params.clone();
            bind.push(Value::Integer(sql_limit(limit)));
            bind.push(Value::Integer(sql_limit(query.offset)));

            let mut stmt = conn.prepare(&compiled.select_sql(query.order_by))?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), enriched_from_row)?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;

            Ok(Page::new(items, total, limit, query.offset))
        })
    }
}
