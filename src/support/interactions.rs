//! Interaction aggregator
//!
//! Interaction data only exists in the relational store. Every operation
//! needs it to be ready, except the two score lookups the tally leans on:
//! those degrade to neutral / empty results so callers can fall back to tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::audit::marks::metadata_object;
use crate::backend::BackendSelector;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::store::{
    validate_account_id, validate_contact_id, InteractionFilter, InteractionStatistics,
    InteractionStore, SupportSummary,
};
use crate::types::{Interaction, InteractionMethod, InteractionType, NewInteraction, Page};

use super::SupportCategory;

/// Newest interaction with a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastContactInfo {
    pub method: InteractionMethod,
    pub timestamp: DateTime<Utc>,
    pub interaction_type: InteractionType,
    pub support_likelihood: Option<i64>,
}

/// Options for `get_contact_interaction_history`
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    pub interaction_type: Option<InteractionType>,
    pub interaction_method: Option<InteractionMethod>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// `None` returns the whole history
    pub limit: Option<usize>,
}

fn validate_date_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> StoreResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(StoreError::validation(
            ValidationCode::InvalidDateRange,
            "startDate is later than endDate",
        )),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct InteractionAggregator {
    selector: Arc<BackendSelector>,
    store: Option<Arc<dyn InteractionStore>>,
}

impl InteractionAggregator {
    pub fn new(selector: Arc<BackendSelector>, store: Option<Arc<dyn InteractionStore>>) -> Self {
        Self { selector, store }
    }

    fn store(&self, op: &str) -> StoreResult<Arc<dyn InteractionStore>> {
        match &self.store {
            Some(store) if self.selector.is_active_backend_ready() => Ok(Arc::clone(store)),
            _ => Err(StoreError::BackendUnavailable(format!(
                "{} requires the relational backend",
                op
            ))),
        }
    }

    /// Append an interaction and report the contact's new rounded average
    pub async fn record_interaction(&self, interaction: NewInteraction) -> StoreResult<Interaction> {
        validate_account_id(&interaction.account_id)?;
        validate_contact_id(&interaction.contact_id)?;
        if let Some(score) = interaction.support_likelihood {
            if !(0..=100).contains(&score) {
                return Err(StoreError::validation(
                    ValidationCode::InvalidSupportScore,
                    format!("support likelihood must be between 0 and 100, got {}", score),
                ));
            }
        }

        let store = self.store("recordInteraction")?;
        let interaction = NewInteraction {
            metadata: metadata_object(interaction.metadata),
            ..interaction
        };
        let recorded = store.append_interaction(&interaction).await?;

        let summary = store
            .support_summary(&recorded.account_id, &recorded.contact_id)
            .await?;
        log::info!(
            "✅ Interaction {} recorded for contact {} (account {}, score {:?}, average {:?})",
            recorded.id,
            recorded.contact_id,
            recorded.account_id,
            recorded.support_likelihood,
            summary.average_score
        );
        Ok(recorded)
    }

    /// Neutral summary when interaction data is unreachable
    pub async fn get_contact_support_score(&self, account_id: &str, contact_id: &str) -> SupportSummary {
        let Ok(store) = self.store("getContactSupportScore") else {
            return SupportSummary::unknown();
        };
        match store.support_summary(account_id, contact_id).await {
            Ok(summary) => summary,
            Err(e) => {
                log::warn!(
                    "⚠️  Support score lookup failed for contact {} (account {}): {}",
                    contact_id,
                    account_id,
                    e
                );
                SupportSummary::unknown()
            }
        }
    }

    /// Bucket per contact with scored interactions; empty when unreachable
    pub async fn get_support_categories_for_contacts(
        &self,
        account_id: &str,
        contact_ids: &[String],
    ) -> HashMap<String, SupportCategory> {
        if contact_ids.is_empty() {
            return HashMap::new();
        }
        let Ok(store) = self.store("getSupportCategoriesForContacts") else {
            log::debug!("Interaction scores unavailable for account {}, using tags only", account_id);
            return HashMap::new();
        };

        match store.average_scores(account_id, contact_ids).await {
            Ok(scores) => scores
                .into_iter()
                .map(|(id, score)| (id, SupportCategory::from_score(score)))
                .collect(),
            Err(e) => {
                log::warn!(
                    "⚠️  Could not load interaction support categories for account {}, falling back to contact categories: {}",
                    account_id,
                    e
                );
                HashMap::new()
            }
        }
    }

    /// Newest first
    pub async fn get_contact_interaction_history(
        &self,
        account_id: &str,
        contact_id: &str,
        options: &HistoryOptions,
    ) -> StoreResult<Vec<Interaction>> {
        validate_account_id(account_id)?;
        validate_contact_id(contact_id)?;
        validate_date_range(options.start_date, options.end_date)?;

        let store = self.store("getContactInteractionHistory")?;
        let filter = InteractionFilter {
            contact_id: Some(contact_id.to_string()),
            interaction_type: options.interaction_type,
            interaction_method: options.interaction_method,
            start_date: options.start_date,
            end_date: options.end_date,
            limit: options.limit,
            offset: 0,
        };
        Ok(store.interactions(account_id, &filter).await?.items)
    }

    pub async fn get_last_contact_info(
        &self,
        account_id: &str,
        contact_id: &str,
    ) -> StoreResult<Option<LastContactInfo>> {
        let latest = self
            .get_contact_interaction_history(
                account_id,
                contact_id,
                &HistoryOptions {
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await?;

        Ok(latest.into_iter().next().map(|i| LastContactInfo {
            method: i.interaction_method,
            timestamp: i.created_at,
            interaction_type: i.interaction_type,
            support_likelihood: i.support_likelihood,
        }))
    }

    pub async fn get_interaction_statistics(
        &self,
        account_id: &str,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> StoreResult<InteractionStatistics> {
        validate_account_id(account_id)?;
        validate_date_range(start_date, end_date)?;
        let store = self.store("getInteractionStatistics")?;
        store.interaction_statistics(account_id, start_date, end_date).await
    }

    /// Account-wide listing; a missing limit means one default-sized page
    pub async fn get_all_interactions(
        &self,
        account_id: &str,
        filter: &InteractionFilter,
    ) -> StoreResult<Page<Interaction>> {
        validate_account_id(account_id)?;
        validate_date_range(filter.start_date, filter.end_date)?;
        let store = self.store("getAllInteractions")?;

        let filter = InteractionFilter {
            limit: Some(filter.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
            ..filter.clone()
        };
        store.interactions(account_id, &filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use serde_json::Value;
    use tempfile::tempdir;

    fn aggregator(dir: &std::path::Path, ready: bool) -> InteractionAggregator {
        let store: Arc<dyn InteractionStore> = Arc::new(SqliteStore::open(dir.join("test.db")).unwrap());
        let selector = if ready {
            BackendSelector::relational_ready()
        } else {
            BackendSelector::document_only()
        };
        InteractionAggregator::new(Arc::new(selector), Some(store))
    }

    fn knock(contact: &str, score: Option<i64>) -> NewInteraction {
        NewInteraction {
            account_id: "acct".to_string(),
            contact_id: contact.to_string(),
            user_id: Some("u1".to_string()),
            interaction_type: InteractionType::DoorKnock,
            interaction_method: InteractionMethod::InPerson,
            support_likelihood: score,
            notes: None,
            metadata: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_out_of_range_score_rejected() {
        let dir = tempdir().unwrap();
        let agg = aggregator(dir.path(), true);
        let err = agg.record_interaction(knock("c1", Some(101))).await.unwrap_err();
        assert_eq!(err.code(), Some("INVALID_SUPPORT_SCORE"));
    }

    #[tokio::test]
    async fn test_unavailable_backend_degrades_lookups() {
        let dir = tempdir().unwrap();
        let agg = aggregator(dir.path(), false);

        let err = agg.record_interaction(knock("c1", Some(50))).await.unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable(_)));

        let summary = agg.get_contact_support_score("acct", "c1").await;
        assert_eq!(summary.support_category, SupportCategory::Unknown);
        let categories = agg
            .get_support_categories_for_contacts("acct", &["c1".to_string()])
            .await;
        assert!(categories.is_empty());
    }

    #[tokio::test]
    async fn test_score_and_last_contact() {
        let dir = tempdir().unwrap();
        let agg = aggregator(dir.path(), true);

        agg.record_interaction(knock("c1", Some(60))).await.unwrap();
        agg.record_interaction(knock("c1", None)).await.unwrap();
        let last = agg.record_interaction(knock("c1", Some(99))).await.unwrap();
        assert_eq!(last.metadata, serde_json::json!({}));

        let summary = agg.get_contact_support_score("acct", "c1").await;
        assert_eq!(summary.average_score, Some(80));
        assert_eq!(summary.interaction_count, 2);
        assert_eq!(summary.support_category, SupportCategory::StrongSupport);

        let info = agg.get_last_contact_info("acct", "c1").await.unwrap().unwrap();
        assert_eq!(info.support_likelihood, Some(99));
        assert!(agg.get_last_contact_info("acct", "nobody").await.unwrap().is_none());

        let history = agg
            .get_contact_interaction_history("acct", "c1", &HistoryOptions::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, last.id);
    }

    #[tokio::test]
    async fn test_all_interactions_default_page() {
        let dir = tempdir().unwrap();
        let agg = aggregator(dir.path(), true);
        agg.record_interaction(knock("c1", Some(10))).await.unwrap();
        agg.record_interaction(knock("c2", Some(90))).await.unwrap();

        let page = agg
            .get_all_interactions("acct", &InteractionFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);

        let categories = agg
            .get_support_categories_for_contacts("acct", &["c1".to_string(), "c2".to_string()])
            .await;
        assert_eq!(categories["c1"], SupportCategory::StrongOppose);
        assert_eq!(categories["c2"], SupportCategory::StrongSupport);
    }
}
