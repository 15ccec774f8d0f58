use async_trait::async_trait;

use super::{Collection, DocumentStore};
use crate::error::StoreResult;
use crate::store::VotedStore;
use crate::types::{now, VotedEntry};

#[async_trait]
impl VotedStore for DocumentStore {
    async fn set_voted(&self, account_id: &str, contact_id: &str, marked_by: Option<&str>) -> StoreResult<VotedEntry> {
        let _guard = self.lock_account(account_id).await?;
        let mut entries: Vec<VotedEntry> = self.read_collection(account_id, Collection::Voted).await?;

        let entry = VotedEntry {
            account_id: account_id.to_string(),
            contact_id: contact_id.to_string(),
            voted_at: now(),
            marked_by: marked_by.map(str::to_string),
        };
        match entries.iter_mut().find(|e| e.contact_id == contact_id) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }

        self.write_collection(account_id, Collection::Voted, &entries).await?;
        Ok(entry)
    }

    async fn unset_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool> {
        let _guard = self.lock_account(account_id).await?;
        let mut entries: Vec<VotedEntry> = self.read_collection(account_id, Collection::Voted).await?;

        let before = entries.len();
        entries.retain(|e| e.contact_id != contact_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write_collection(account_id, Collection::Voted, &entries).await?;
        Ok(true)
    }

    async fn clear_all_voted(&self, account_id: &str) -> StoreResult<usize> {
        let _guard = self.lock_account(account_id).await?;
        let entries: Vec<VotedEntry> = self.read_collection(account_id, Collection::Voted).await?;

        let empty: [VotedEntry; 0] = [];
        self.write_collection(account_id, Collection::Voted, &empty).await?;
        log::info!("🧹 Cleared {} voted entries for account {}", entries.len(), account_id);
        Ok(entries.len())
    }

    async fn is_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool> {
        let entries: Vec<VotedEntry> = self.read_collection(account_id, Collection::Voted).await?;
        Ok(entries.iter().any(|e| e.contact_id == contact_id))
    }

    async fn voted_contact_ids(&self, account_id: &str) -> StoreResult<Vec<String>> {
        let entries: Vec<VotedEntry> = self.read_collection(account_id, Collection::Voted).await?;
        Ok(entries.into_iter().map(|e| e.contact_id).collect())
    }
}
