//! Component interfaces, one per persisted concern
//!
//! Each trait has a relational (`sqlite::SqliteStore`) and a document
//! (`document::DocumentStore`) implementation, except `InteractionStore`:
//! interaction data only exists in the relational store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::segment::{ContactQuery, FilterConfig};
use crate::support::SupportCategory;
use crate::types::{
    Contact, ElectionList, EnrichedContact, Interaction, InteractionMethod, InteractionType,
    NewInteraction, Page, PollKey, PollTurnout, VoteMark, VotedEntry,
};

pub mod document;
pub mod sqlite;

pub use document::DocumentStore;
pub use sqlite::SqliteStore;

/// Read side of the CRM collaborator, plus the import path used to seed it
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Non-deleted contacts of one account
    async fn account_contacts(&self, account_id: &str) -> StoreResult<Vec<Contact>>;

    /// Contacts with the given ids (deleted ones included), in no particular order
    async fn contacts_by_ids(&self, account_id: &str, ids: &[String]) -> StoreResult<Vec<Contact>>;

    /// Insert or replace by id; returns the number written
    async fn upsert_contacts(&self, account_id: &str, contacts: &[Contact]) -> StoreResult<usize>;

    fn backend_type(&self) -> &'static str;
}

/// Filter evaluation over an account's contacts
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// `filter` is already sanitized and validated
    async fn count_contacts(&self, account_id: &str, filter: &FilterConfig) -> StoreResult<i64>;

    /// `query.limit` is already resolved
    async fn query_contacts(
        &self,
        account_id: &str,
        filter: &FilterConfig,
        query: &ContactQuery,
    ) -> StoreResult<Page<EnrichedContact>>;
}

/// Saved views
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Upsert by id. An existing row keeps its `created_at`; a soft-deleted
    /// row is revived. Returns the stored list.
    async fn save_list(&self, list: &ElectionList) -> StoreResult<ElectionList>;

    /// Non-deleted list, or `None`
    async fn get_list(&self, account_id: &str, list_id: &str) -> StoreResult<Option<ElectionList>>;

    /// Own + shared lists for `user_id`, shared only without one; newest first
    async fn get_lists(&self, account_id: &str, user_id: Option<&str>) -> StoreResult<Vec<ElectionList>>;

    /// Soft delete; `false` when nothing was deleted
    async fn delete_list(&self, account_id: &str, list_id: &str) -> StoreResult<bool>;

    async fn update_list_count(
        &self,
        account_id: &str,
        list_id: &str,
        contact_count: i64,
    ) -> StoreResult<Option<ElectionList>>;
}

/// Filters for `getVoteMarks`; exact match on every set field except
/// `contact_search` (case-insensitive substring of the contact id)
#[derive(Debug, Clone)]
pub struct VoteMarkFilter {
    pub poll_number: Option<String>,
    pub riding: Option<String>,
    pub province: Option<String>,
    pub marked_by: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub contact_search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for VoteMarkFilter {
    fn default() -> Self {
        Self {
            poll_number: None,
            riding: None,
            province: None,
            marked_by: None,
            start_date: None,
            end_date: None,
            contact_search: None,
            limit: crate::config::DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl VoteMarkFilter {
    pub fn matches(&self, mark: &VoteMark) -> bool {
        let eq = |wanted: &Option<String>, actual: &Option<String>| {
            wanted.as_ref().map_or(true, |w| actual.as_deref() == Some(w.as_str()))
        };
        self.poll_number.as_ref().map_or(true, |p| *p == mark.poll_number)
            && eq(&self.riding, &mark.riding)
            && eq(&self.province, &mark.province)
            && eq(&self.marked_by, &mark.marked_by)
            && self.start_date.map_or(true, |start| mark.marked_at >= start)
            && self.end_date.map_or(true, |end| mark.marked_at <= end)
            && self.contact_search.as_ref().map_or(true, |q| {
                mark.contact_id.to_lowercase().contains(&q.to_lowercase())
            })
    }
}

/// Append-only vote marks and the turnout aggregate derived from them
///
/// No update or delete operation exists for vote marks.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append `mark`, then increment `votes_cast` for its poll key (creating
    /// the row with `total_voters = 0`). Returns the updated turnout row.
    async fn record_vote(&self, mark: &VoteMark) -> StoreResult<PollTurnout>;

    /// Upsert the externally supplied `total_voters`; `votes_cast` untouched
    async fn set_total_voters(
        &self,
        account_id: &str,
        key: &PollKey,
        total_voters: i64,
        updated_by: Option<&str>,
    ) -> StoreResult<PollTurnout>;

    /// Most recent first
    async fn vote_marks(&self, account_id: &str, filter: &VoteMarkFilter) -> StoreResult<Page<VoteMark>>;

    /// Lookup by normalized code
    async fn find_vote_mark(&self, account_id: &str, code: &str) -> StoreResult<Option<VoteMark>>;

    async fn poll_turnout(&self, account_id: &str) -> StoreResult<Vec<PollTurnout>>;
}

/// Mutable running-tally flags
#[async_trait]
pub trait VotedStore: Send + Sync {
    /// Idempotent; re-marking refreshes `voted_at` and `marked_by`
    async fn set_voted(&self, account_id: &str, contact_id: &str, marked_by: Option<&str>) -> StoreResult<VotedEntry>;

    async fn unset_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool>;

    /// Returns how many entries were removed
    async fn clear_all_voted(&self, account_id: &str) -> StoreResult<usize>;

    async fn is_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool>;

    /// In the order contacts were first marked
    async fn voted_contact_ids(&self, account_id: &str) -> StoreResult<Vec<String>>;
}

/// Filters for interaction listings
#[derive(Debug, Clone, Default)]
pub struct InteractionFilter {
    pub contact_id: Option<String>,
    pub interaction_type: Option<InteractionType>,
    pub interaction_method: Option<InteractionMethod>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// `None` returns everything
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Aggregate over a contact's scored interactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportSummary {
    pub average_score: Option<i64>,
    /// Scored interactions only
    pub interaction_count: i64,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub highest_score: Option<i64>,
    pub lowest_score: Option<i64>,
    pub support_category: SupportCategory,
}

impl SupportSummary {
    pub fn unknown() -> Self {
        Self {
            average_score: None,
            interaction_count: 0,
            last_interaction_at: None,
            highest_score: None,
            lowest_score: None,
            support_category: SupportCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionTotals {
    pub total_interactions: i64,
    pub unique_contacts: i64,
    pub average_support_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionBreakdown {
    pub interaction_type: InteractionType,
    pub interaction_method: InteractionMethod,
    pub count: i64,
    pub unique_contacts: i64,
    pub unique_users: i64,
    pub average_support_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionStatistics {
    pub overall: InteractionTotals,
    pub by_type: Vec<InteractionBreakdown>,
}

/// Append-only canvassing log (relational only)
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn append_interaction(&self, interaction: &NewInteraction) -> StoreResult<Interaction>;

    /// Newest first
    async fn interactions(&self, account_id: &str, filter: &InteractionFilter) -> StoreResult<Page<Interaction>>;

    async fn support_summary(&self, account_id: &str, contact_id: &str) -> StoreResult<SupportSummary>;

    /// Rounded mean score per contact; contacts without scored interactions are absent
    async fn average_scores(&self, account_id: &str, contact_ids: &[String]) -> StoreResult<HashMap<String, i64>>;

    async fn interaction_statistics(
        &self,
        account_id: &str,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> StoreResult<InteractionStatistics>;
}

/// Account ids are opaque, but they also name document-store directories
pub fn validate_account_id(account_id: &str) -> StoreResult<()> {
    let invalid = account_id.trim().is_empty()
        || account_id.contains('/')
        || account_id.contains('\\')
        || account_id.contains("..")
        || account_id.contains('\0');
    if invalid {
        return Err(StoreError::validation(
            ValidationCode::InvalidAccountId,
            format!("invalid account id '{}'", account_id),
        ));
    }
    Ok(())
}

pub fn validate_contact_id(contact_id: &str) -> StoreResult<()> {
    if contact_id.trim().is_empty() {
        return Err(StoreError::validation(
            ValidationCode::InvalidContactId,
            "contact id must not be blank",
        ));
    }
    Ok(())
}
