//! Per-account JSON document store
//!
//! Layout: `{root}/{account_id}/{collection}.json`, each a pretty-printed
//! array. Writes go to a temp file that is then renamed over the target.
//! Read-modify-write cycles hold a per-account async lock, so two writers on
//! the same account never lose each other's updates within one process.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{StoreError, StoreResult};
use crate::ids::random_base36;
use crate::store::validate_account_id;

mod audit;
mod contacts;
mod lists;
mod voted;

/// One array-of-records file per account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Contacts,
    VoteMarks,
    PollTurnout,
    ElectionLists,
    Voted,
}

impl Collection {
    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Contacts => "contacts.json",
            Collection::VoteMarks => "vote-marks.json",
            Collection::PollTurnout => "poll-turnout.json",
            Collection::ElectionLists => "election-lists.json",
            Collection::Voted => "scrutineering-voted.json",
        }
    }
}

pub struct DocumentStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        log::info!("✅ Document store rooted at {}", root.display());
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_path(&self, account_id: &str, collection: Collection) -> StoreResult<PathBuf> {
        validate_account_id(account_id)?;
        Ok(self.root.join(account_id).join(collection.file_name()))
    }

    /// Serialise read-modify-write cycles for one account
    pub(crate) async fn lock_account(&self, account_id: &str) -> StoreResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| StoreError::Database("document lock table poisoned".to_string()))?;
            Arc::clone(locks.entry(account_id.to_string()).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    /// Missing file reads as an empty collection
    pub(crate) async fn read_collection<T: DeserializeOwned>(
        &self,
        account_id: &str,
        collection: Collection,
    ) -> StoreResult<Vec<T>> {
        let path = self.collection_path(account_id, collection)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Temp file + rename; callers hold the account lock
    pub(crate) async fn write_collection<T: Serialize + Sync>(
        &self,
        account_id: &str,
        collection: Collection,
        records: &[T],
    ) -> StoreResult<()> {
        let path = self.collection_path(account_id, collection)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp = path.with_extension(format!("json.tmp.{}", random_base36(8)));
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        log::debug!(
            "Saved {} records to {}",
            records.len(),
            path.display()
        );
        Ok(())
    }
}
