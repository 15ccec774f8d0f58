//! Filter compiler: `FilterConfig` -> SQLite predicate over `contacts`
//!
//! Every query joins a per-contact interaction aggregate `s`:
//! - `support_score`: rounded mean of non-null support_likelihood
//! - `interaction_count`: all interactions
//! - `last_interaction_at`: newest interaction timestamp (millis)
//!
//! Placeholders are positional `?`; `params` is in placeholder order.

use rusqlite::types::Value;

use super::filter::{FilterConfig, OrderBy};
use crate::types::to_millis;

/// Aggregate join shared by counts and result queries
const FROM_CONTACTS: &str = "FROM contacts c
     LEFT JOIN (
         SELECT contact_id,
                CAST(ROUND(AVG(support_likelihood)) AS INTEGER) AS support_score,
                COUNT(*) AS interaction_count,
                MAX(created_at) AS last_interaction_at
         FROM interactions
         WHERE account_id = ?
         GROUP BY contact_id
     ) s ON s.contact_id = c.id";

/// Columns selected for `EnrichedContact` rows
pub(crate) const ENRICHED_COLUMNS: &str = "c.*,
     s.support_score AS support_score,
     COALESCE(s.interaction_count, 0) AS interaction_count,
     s.last_interaction_at AS last_interaction_at";

#[derive(Debug, Clone)]
pub(crate) struct CompiledFilter {
    /// `FROM ... WHERE ...` without ORDER BY / LIMIT
    pub from_where: String,
    pub params: Vec<Value>,
}

impl CompiledFilter {
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) {}", self.from_where)
    }

    /// Result query; appends LIMIT/OFFSET placeholders, so push those two
    /// values after `params` when binding.
    pub fn select_sql(&self, order_by: OrderBy) -> String {
        format!(
            "SELECT {} {} ORDER BY {} LIMIT ? OFFSET ?",
            ENRICHED_COLUMNS,
            self.from_where,
            order_clause(order_by)
        )
    }
}

pub(crate) fn order_clause(order_by: OrderBy) -> &'static str {
    match order_by {
        OrderBy::SupportScore => "s.support_score IS NULL, s.support_score DESC, c.id ASC",
        OrderBy::LastInteraction => {
            "s.last_interaction_at IS NULL, s.last_interaction_at DESC, c.id ASC"
        }
        OrderBy::Name => {
            "COALESCE(c.name, TRIM(COALESCE(c.first_name, '') || ' ' || COALESCE(c.last_name, ''))) ASC, c.id ASC"
        }
        OrderBy::CreatedAt => "c.created_at DESC, c.id ASC",
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Compile a sanitized filter for one account
pub(crate) fn compile(account_id: &str, filter: &FilterConfig) -> CompiledFilter {
    let mut sql = String::from(FROM_CONTACTS);
    // aggregate subquery + outer account scope
    let mut params = vec![text(account_id), text(account_id)];
    sql.push_str(" WHERE c.account_id = ? AND c.deleted_at IS NULL");

    if let Some(ids) = filter.static_contact_ids() {
        if ids.is_empty() {
            sql.push_str(" AND 0");
        } else {
            sql.push_str(&format!(" AND c.id IN ({})", placeholders(ids.len())));
            params.extend(ids.iter().map(|id| text(id)));
        }
        return CompiledFilter {
            from_where: sql,
            params,
        };
    }

    if let Some(poll) = &filter.poll_number {
        sql.push_str(" AND c.poll_number = ?");
        params.push(text(poll));
    }
    if let Some(riding) = &filter.riding {
        sql.push_str(" AND c.riding = ?");
        params.push(text(riding));
    }
    if let Some(province) = &filter.province {
        sql.push_str(" AND c.province = ?");
        params.push(text(province));
    }
    if let Some(city) = &filter.city {
        sql.push_str(" AND LOWER(c.city) = LOWER(?)");
        params.push(text(city));
    }
    if !filter.categories.is_empty() {
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM json_each(c.categories) t WHERE t.value IN ({}))",
            placeholders(filter.categories.len())
        ));
        params.extend(filter.categories.iter().map(|c| text(c)));
    }
    if let Some(category) = &filter.category {
        sql.push_str(
            " AND (EXISTS (SELECT 1 FROM json_each(c.categories) t WHERE t.value = ?) OR c.category = ?)",
        );
        params.push(text(category));
        params.push(text(category));
    }

    if let Some(min) = filter.min_support_score {
        sql.push_str(" AND s.support_score >= ?");
        params.push(Value::Integer(min));
    }
    if let Some(max) = filter.max_support_score {
        sql.push_str(" AND s.support_score <= ?");
        params.push(Value::Integer(max));
    }
    if let Some((lo, hi)) = filter.support_category.and_then(|c| c.score_range()) {
        sql.push_str(" AND s.support_score BETWEEN ? AND ?");
        params.push(Value::Integer(lo));
        params.push(Value::Integer(hi));
    }
    match filter.has_interactions {
        Some(true) => sql.push_str(" AND COALESCE(s.interaction_count, 0) > 0"),
        Some(false) => sql.push_str(" AND COALESCE(s.interaction_count, 0) = 0"),
        None => {}
    }
    if let Some(after) = &filter.last_interaction_after {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM interactions i
                 WHERE i.account_id = c.account_id AND i.contact_id = c.id AND i.created_at >= ?)",
        );
        params.push(Value::Integer(to_millis(after)));
    }
    if let Some(before) = &filter.last_interaction_before {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM interactions i
                 WHERE i.account_id = c.account_id AND i.contact_id = c.id AND i.created_at <= ?)",
        );
        params.push(Value::Integer(to_millis(before)));
    }

    CompiledFilter {
        from_where: sql,
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::SupportCategory;

    fn placeholder_count(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_params_line_up_with_placeholders() {
        let filter = FilterConfig {
            poll_number: Some("101".to_string()),
            city: Some("Calgary".to_string()),
            categories: vec!["Donor".to_string(), "Member".to_string()],
            category: Some("Supporter".to_string()),
            min_support_score: Some(10),
            support_category: Some(SupportCategory::StrongSupport),
            has_interactions: Some(true),
            ..Default::default()
        };
        let compiled = compile("acct", &filter);
        assert_eq!(placeholder_count(&compiled.from_where), compiled.params.len());
        assert!(compiled.from_where.contains("BETWEEN ? AND ?"));
    }

    #[test]
    fn test_static_ids_skip_other_predicates() {
        let mut filter = FilterConfig::static_ids(vec!["a".to_string(), "b".to_string()]);
        filter.poll_number = Some("101".to_string());
        let compiled = compile("acct", &filter);
        assert!(compiled.from_where.contains("c.id IN (?, ?)"));
        assert!(!compiled.from_where.contains("poll_number"));
        assert_eq!(compiled.params.len(), 4);
    }

    #[test]
    fn test_empty_static_list_matches_nothing() {
        let filter = FilterConfig::static_ids(Vec::new());
        assert!(compile("acct", &filter).from_where.ends_with("AND 0"));
    }
}
