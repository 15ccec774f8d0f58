use async_trait::async_trait;

use super::{Collection, DocumentStore};
use crate::error::StoreResult;
use crate::store::ListStore;
use crate::types::{now, ElectionList};

fn live(list: &ElectionList, account_id: &str, list_id: &str) -> bool {
    list.id == list_id && list.account_id == account_id && list.deleted_at.is_none()
}

#[async_trait]
impl ListStore for DocumentStore {
    async fn save_list(&self, list: &ElectionList) -> StoreResult<ElectionList> {
        let _guard = self.lock_account(&list.account_id).await?;
        let mut lists: Vec<ElectionList> = self
            .read_collection(&list.account_id, Collection::ElectionLists)
            .await?;

        let stored = match lists.iter().position(|l| l.id == list.id) {
            Some(index) => {
                let created_at = lists[index].created_at;
                lists[index] = ElectionList {
                    created_at,
                    deleted_at: None,
                    ..list.clone()
                };
                lists[index].clone()
            }
            None => {
                let fresh = ElectionList {
                    deleted_at: None,
                    ..list.clone()
                };
                lists.push(fresh.clone());
                fresh
            }
        };

        self.write_collection(&list.account_id, Collection::ElectionLists, &lists)
            .await?;
        log::info!("✅ Saved list {} for account {}", stored.id, stored.account_id);
        Ok(stored)
    }

    async fn get_list(&self, account_id: &str, list_id: &str) -> StoreResult<Option<ElectionList>> {
        let lists: Vec<ElectionList> = self.read_collection(account_id, Collection::ElectionLists).await?;
        Ok(lists.into_iter().find(|l| live(l, account_id, list_id)))
    }

    async fn get_lists(&self, account_id: &str, user_id: Option<&str>) -> StoreResult<Vec<ElectionList>> {
        let lists: Vec<ElectionList> = self.read_collection(account_id, Collection::ElectionLists).await?;
        let mut visible: Vec<ElectionList> = lists
            .into_iter()
            .filter(|l| l.account_id == account_id && l.deleted_at.is_none())
            .filter(|l| l.is_shared || (user_id.is_some() && l.user_id.as_deref() == user_id))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(visible)
    }

    async fn delete_list(&self, account_id: &str, list_id: &str) -> StoreResult<bool> {
        let _guard = self.lock_account(account_id).await?;
        let mut lists: Vec<ElectionList> = self.read_collection(account_id, Collection::ElectionLists).await?;

        let Some(list) = lists.iter_mut().find(|l| live(l, account_id, list_id)) else {
            return Ok(false);
        };
        let deleted_at = now();
        list.deleted_at = Some(deleted_at);
        list.updated_at = deleted_at;

        self.write_collection(account_id, Collection::ElectionLists, &lists).await?;
        Ok(true)
    }

    async fn update_list_count(
        &self,
        account_id: &str,
        list_id: &str,
        contact_count: i64,
    ) -> StoreResult<Option<ElectionList>> {
        let _guard = self.lock_account(account_id).await?;
        let mut lists: Vec<ElectionList> = self.read_collection(account_id, Collection::ElectionLists).await?;

        let Some(list) = lists.iter_mut().find(|l| live(l, account_id, list_id)) else {
            return Ok(None);
        };
        list.contact_count = contact_count;
        list.updated_at = now();
        let updated = list.clone();

        self.write_collection(account_id, Collection::ElectionLists, &lists).await?;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::FilterConfig;
    use crate::types::from_millis;
    use tempfile::tempdir;

    fn list(id: &str, created: i64) -> ElectionList {
        ElectionList {
            id: id.to_string(),
            account_id: "acct".to_string(),
            user_id: Some("u1".to_string()),
            name: "Poll 101".to_string(),
            description: String::new(),
            filter_config: FilterConfig::default(),
            is_shared: false,
            contact_count: 0,
            created_at: from_millis(created),
            updated_at: from_millis(created),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_save_preserves_created_at_and_revives() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store.save_list(&list("l1", 1_000)).await.unwrap();
        assert!(store.delete_list("acct", "l1").await.unwrap());
        assert!(store.get_list("acct", "l1").await.unwrap().is_none());

        let revived = store.save_list(&list("l1", 5_000)).await.unwrap();
        assert_eq!(revived.created_at, from_millis(1_000));
        assert!(revived.deleted_at.is_none());
        assert!(store.get_list("acct", "l1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_count_on_missing_list() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(store.update_list_count("acct", "nope", 4).await.unwrap().is_none());

        store.save_list(&list("l1", 1_000)).await.unwrap();
        let updated = store.update_list_count("acct", "l1", 4).await.unwrap().unwrap();
        assert_eq!(updated.contact_count, 4);
    }
}
