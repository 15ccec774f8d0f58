use async_trait::async_trait;
use std::collections::HashSet;

use super::{Collection, DocumentStore};
use crate::error::StoreResult;
use crate::segment::{sort_contacts, ContactQuery, FilterConfig};
use crate::store::{ContactDirectory, SegmentStore};
use crate::types::{Contact, EnrichedContact, Page};

impl DocumentStore {
    /// Full scan of the account's contacts through the structural predicates
    async fn matching_contacts(&self, account_id: &str, filter: &FilterConfig) -> StoreResult<Vec<Contact>> {
        let skipped = filter.interaction_predicates();
        if !skipped.is_empty() && filter.static_contact_ids().is_none() {
            log::debug!(
                "Document path ignores interaction filters for account {}: {}",
                account_id,
                skipped.join(", ")
            );
        }

        let contacts: Vec<Contact> = self.read_collection(account_id, Collection::Contacts).await?;
        Ok(contacts
            .into_iter()
            .filter(|c| filter.matches_contact(c))
            .collect())
    }
}

#[async_trait]
impl ContactDirectory for DocumentStore {
    async fn account_contacts(&self, account_id: &str) -> StoreResult<Vec<Contact>> {
        let contacts: Vec<Contact> = self.read_collection(account_id, Collection::Contacts).await?;
        let mut live: Vec<Contact> = contacts.into_iter().filter(|c| !c.is_deleted()).collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(live)
    }

    async fn contacts_by_ids(&self, account_id: &str, ids: &[String]) -> StoreResult<Vec<Contact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let contacts: Vec<Contact> = self.read_collection(account_id, Collection::Contacts).await?;
        Ok(contacts
            .into_iter()
            .filter(|c| wanted.contains(c.id.as_str()))
            .collect())
    }

    async fn upsert_contacts(&self, account_id: &str, contacts: &[Contact]) -> StoreResult<usize> {
        let _guard = self.lock_account(account_id).await?;
        let mut stored: Vec<Contact> = self.read_collection(account_id, Collection::Contacts).await?;

        for contact in contacts {
            match stored.iter_mut().find(|c| c.id == contact.id) {
                Some(existing) => *existing = contact.clone(),
                None => stored.push(contact.clone()),
            }
        }

        self.write_collection(account_id, Collection::Contacts, &stored).await?;
        log::debug!("✅ Upserted {} contacts for account {}", contacts.len(), account_id);
        Ok(contacts.len())
    }

    fn backend_type(&self) -> &'static str {
        "JSON"
    }
}

#[async_trait]
impl SegmentStore for DocumentStore {
    async fn count_contacts(&self, account_id: &str, filter: &FilterConfig) -> StoreResult<i64> {
        Ok(self.matching_contacts(account_id, filter).await?.len() as i64)
    }

    async fn query_contacts(
        &self,
        account_id: &str,
        filter: &FilterConfig,
        query: &ContactQuery,
    ) -> StoreResult<Page<EnrichedContact>> {
        let mut enriched: Vec<EnrichedContact> = self
            .matching_contacts(account_id, filter)
            .await?
            .into_iter()
            .map(EnrichedContact::without_interactions)
            .collect();
        sort_contacts(&mut enriched, query.order_by);

        let limit = query.resolved_limit(crate::config::DEFAULT_PAGE_SIZE);
        Ok(Page::from_ordered(enriched, limit, query.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::OrderBy;
    use crate::types::from_millis;
    use tempfile::tempdir;

    fn contact(id: &str, created: i64, city: &str) -> Contact {
        let mut c = Contact::new(id, from_millis(created));
        c.city = Some(city.to_string());
        c
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store.upsert_contacts("acct", &[contact("c1", 1, "Calgary")]).await.unwrap();
        store.upsert_contacts("acct", &[contact("c1", 1, "Edmonton"), contact("c2", 2, "Banff")]).await.unwrap();

        let all = store.account_contacts("acct").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "c2");
        assert_eq!(all[1].city.as_deref(), Some("Edmonton"));
    }

    #[tokio::test]
    async fn test_interaction_filters_are_no_ops() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store
            .upsert_contacts("acct", &[contact("c1", 1, "Calgary"), contact("c2", 2, "Calgary")])
            .await
            .unwrap();

        let filter = FilterConfig {
            min_support_score: Some(90),
            has_interactions: Some(true),
            ..Default::default()
        };
        assert_eq!(store.count_contacts("acct", &filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reads_crm_export_with_null_timestamps_and_deleted_flag() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let path = store.collection_path("acct", Collection::Contacts).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[
                {"id": "c1", "city": "Calgary", "createdAt": "2024-03-01T00:00:00Z"},
                {"id": "c2", "city": "Calgary", "createdAt": null},
                {"id": "c3", "city": "Calgary", "createdAt": "2024-02-01T00:00:00Z", "deleted": true}
            ]"#,
        )
        .unwrap();

        let filter = FilterConfig::default();
        assert_eq!(store.count_contacts("acct", &filter).await.unwrap(), 2);

        let page = store
            .query_contacts("acct", &filter, &ContactQuery::unbounded())
            .await
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|c| c.contact.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);

        let live = store.account_contacts("acct").await.unwrap();
        assert_eq!(live.len(), 2);
    }

    #[tokio::test]
    async fn test_query_orders_and_paginates() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let mut named = contact("c1", 1, "Calgary");
        named.name = Some("Zed".to_string());
        let mut other = contact("c2", 2, "Calgary");
        other.name = Some("Amy".to_string());
        store.upsert_contacts("acct", &[named, other]).await.unwrap();

        let page = store
            .query_contacts(
                "acct",
                &FilterConfig::default(),
                &ContactQuery::page(1, 0).ordered_by(OrderBy::Name),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].contact.id, "c2");
        assert_eq!(page.items[0].interaction_count, 0);
        assert!(page.has_more);
    }
}
