//! List / segment manager
//!
//! Filter evaluation and saved lists, routed through the backend dispatcher.
//! `contact_count` on a saved list is a cache: it is computed on save and on
//! an explicit refresh, never invalidated automatically.

use crate::backend::Dispatcher;
use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::ids::generate_id;
use crate::store::{validate_account_id, ListStore, SegmentStore};
use crate::types::{now, to_millis, ElectionList, EnrichedContact, ListDraft, Page};

use super::{ContactQuery, FilterConfig};

const MAX_LIST_NAME_LEN: usize = 255;

fn validate_list_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::validation(
            ValidationCode::InvalidListName,
            "list name must not be blank",
        ));
    }
    if name.chars().count() > MAX_LIST_NAME_LEN {
        return Err(StoreError::validation(
            ValidationCode::ListNameTooLong,
            format!("list name exceeds {} characters", MAX_LIST_NAME_LEN),
        ));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct ListManager {
    segments: Dispatcher<dyn SegmentStore>,
    lists: Dispatcher<dyn ListStore>,
    default_page_size: usize,
}

impl ListManager {
    pub fn new(
        segments: Dispatcher<dyn SegmentStore>,
        lists: Dispatcher<dyn ListStore>,
        default_page_size: usize,
    ) -> Self {
        Self {
            segments,
            lists,
            default_page_size,
        }
    }

    /// Number of non-deleted contacts matching `filter`
    pub async fn calculate_list_contact_count(
        &self,
        account_id: &str,
        filter: &FilterConfig,
    ) -> StoreResult<i64> {
        validate_account_id(account_id)?;
        let filter = &filter.prepare()?;

        self.segments
            .run("calculateListContactCount", |store| async move {
                store.count_contacts(account_id, filter).await
            })
            .await
    }

    /// One page of enriched, ordered matches
    pub async fn get_contacts_by_filters(
        &self,
        account_id: &str,
        filter: &FilterConfig,
        query: &ContactQuery,
    ) -> StoreResult<Page<EnrichedContact>> {
        validate_account_id(account_id)?;
        let filter = &filter.prepare()?;
        let query = &ContactQuery {
            limit: Some(query.resolved_limit(self.default_page_size)),
            ..query.clone()
        };

        self.segments
            .run("getContactsByFilters", |store| async move {
                store.query_contacts(account_id, filter, query).await
            })
            .await
    }

    /// Upsert a list and recompute its count inline
    pub async fn save_list(&self, draft: ListDraft) -> StoreResult<ElectionList> {
        validate_account_id(&draft.account_id)?;
        let name = validate_list_name(&draft.name)?;

        let filter_config = match draft.contact_ids {
            Some(ids) => FilterConfig::static_ids(ids),
            None => draft.filter_config,
        }
        .prepare()?;

        let contact_count = self
            .calculate_list_contact_count(&draft.account_id, &filter_config)
            .await?;

        let timestamp = now();
        let list = ElectionList {
            id: draft
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| generate_id("list", to_millis(&timestamp))),
            account_id: draft.account_id,
            user_id: draft.user_id,
            name,
            description: draft.description.unwrap_or_default(),
            filter_config,
            is_shared: draft.is_shared,
            contact_count,
            created_at: timestamp,
            updated_at: timestamp,
            deleted_at: None,
        };

        let list = &list;
        let saved = self
            .lists
            .run("saveList", |store| async move { store.save_list(list).await })
            .await?;
        log::info!(
            "✅ List {} saved for account {} ({} contacts)",
            saved.id,
            saved.account_id,
            saved.contact_count
        );
        Ok(saved)
    }

    pub async fn get_list(&self, account_id: &str, list_id: &str) -> StoreResult<Option<ElectionList>> {
        validate_account_id(account_id)?;
        self.lists
            .run("getList", |store| async move { store.get_list(account_id, list_id).await })
            .await
    }

    pub async fn get_lists(&self, account_id: &str, user_id: Option<&str>) -> StoreResult<Vec<ElectionList>> {
        validate_account_id(account_id)?;
        self.lists
            .run("getLists", |store| async move { store.get_lists(account_id, user_id).await })
            .await
    }

    pub async fn delete_list(&self, account_id: &str, list_id: &str) -> StoreResult<bool> {
        validate_account_id(account_id)?;
        let deleted = self
            .lists
            .run("deleteList", |store| async move { store.delete_list(account_id, list_id).await })
            .await?;
        if deleted {
            log::info!("🗑️  List {} deleted for account {}", list_id, account_id);
        }
        Ok(deleted)
    }

    /// Recount against the stored filter; `None` when the list is unknown
    pub async fn refresh_list_count(
        &self,
        account_id: &str,
        list_id: &str,
    ) -> StoreResult<Option<ElectionList>> {
        let Some(list) = self.get_list(account_id, list_id).await? else {
            return Ok(None);
        };

        let count = self
            .calculate_list_contact_count(account_id, &list.filter_config)
            .await?;
        self.lists
            .run("refreshListCount", |store| async move {
                store.update_list_count(account_id, list_id, count).await
            })
            .await
    }

    /// Members of a saved list; `None` when the list is unknown
    pub async fn get_list_contacts(
        &self,
        account_id: &str,
        list_id: &str,
        query: &ContactQuery,
    ) -> StoreResult<Option<Page<EnrichedContact>>> {
        let Some(list) = self.get_list(account_id, list_id).await? else {
            return Ok(None);
        };
        let page = self
            .get_contacts_by_filters(account_id, &list.filter_config, query)
            .await?;
        Ok(Some(page))
    }
}
