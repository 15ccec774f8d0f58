use async_trait::async_trait;

use super::{Collection, DocumentStore};
use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::store::{AuditStore, VoteMarkFilter};
use crate::types::{now, Page, PollKey, PollTurnout, VoteMark};

impl DocumentStore {
    /// Find-or-create the turnout row for `key`; returns its index
    fn turnout_slot(rows: &mut Vec<PollTurnout>, account_id: &str, key: &PollKey) -> usize {
        if let Some(index) = rows.iter().position(|r| r.key() == *key) {
            return index;
        }
        rows.push(PollTurnout {
            account_id: account_id.to_string(),
            poll_number: key.poll_number.clone(),
            riding: key.riding.clone(),
            province: key.province.clone(),
            total_voters: 0,
            votes_cast: 0,
            updated_by: None,
            last_updated_at: now(),
        });
        rows.len() - 1
    }
}

#[async_trait]
impl AuditStore for DocumentStore {
    async fn record_vote(&self, mark: &VoteMark) -> StoreResult<PollTurnout> {
        let _guard = self.lock_account(&mark.account_id).await?;

        let mut marks: Vec<VoteMark> = self.read_collection(&mark.account_id, Collection::VoteMarks).await?;
        if marks.iter().any(|m| m.verification_code == mark.verification_code) {
            return Err(StoreError::validation(
                ValidationCode::DuplicateVerificationCode,
                "verification code already exists",
            ));
        }
        marks.push(mark.clone());
        self.write_collection(&mark.account_id, Collection::VoteMarks, &marks).await?;

        // Second write; a failure here leaves the mark recorded without its increment
        let key = PollKey::new(
            mark.poll_number.clone(),
            mark.riding.as_deref(),
            mark.province.as_deref(),
        );
        let mut rows: Vec<PollTurnout> = self.read_collection(&mark.account_id, Collection::PollTurnout).await?;
        let index = Self::turnout_slot(&mut rows, &mark.account_id, &key);
        let row = &mut rows[index];
        row.votes_cast += 1;
        row.updated_by = mark.marked_by.clone();
        row.last_updated_at = mark.marked_at;
        let updated = row.clone();

        if let Err(e) = self.write_collection(&mark.account_id, Collection::PollTurnout, &rows).await {
            log::error!(
                "❌ Vote mark {} stored but turnout for poll {} not updated: {}",
                mark.id,
                key.poll_number,
                e
            );
            return Err(e);
        }
        Ok(updated)
    }

    async fn set_total_voters(
        &self,
        account_id: &str,
        key: &PollKey,
        total_voters: i64,
        updated_by: Option<&str>,
    ) -> StoreResult<PollTurnout> {
        let _guard = self.lock_account(account_id).await?;
        let mut rows: Vec<PollTurnout> = self.read_collection(account_id, Collection::PollTurnout).await?;

        let index = Self::turnout_slot(&mut rows, account_id, key);
        let row = &mut rows[index];
        row.total_voters = total_voters;
        row.updated_by = updated_by.map(str::to_string);
        row.last_updated_at = now();
        let updated = row.clone();

        self.write_collection(account_id, Collection::PollTurnout, &rows).await?;
        Ok(updated)
    }

    async fn vote_marks(&self, account_id: &str, filter: &VoteMarkFilter) -> StoreResult<Page<VoteMark>> {
        let marks: Vec<VoteMark> = self.read_collection(account_id, Collection::VoteMarks).await?;

        // Reversed file order + stable sort: newest append wins among equal timestamps
        let mut matching: Vec<VoteMark> = marks
            .into_iter()
            .rev()
            .filter(|m| filter.matches(m))
            .collect();
        matching.sort_by(|a, b| b.marked_at.cmp(&a.marked_at));

        Ok(Page::from_ordered(matching, filter.limit, filter.offset))
    }

    async fn find_vote_mark(&self, account_id: &str, code: &str) -> StoreResult<Option<VoteMark>> {
        let marks: Vec<VoteMark> = self.read_collection(account_id, Collection::VoteMarks).await?;
        Ok(marks.into_iter().find(|m| m.verification_code == code))
    }

    async fn poll_turnout(&self, account_id: &str) -> StoreResult<Vec<PollTurnout>> {
        let mut rows: Vec<PollTurnout> = self.read_collection(account_id, Collection::PollTurnout).await?;
        rows.sort_by(|a, b| {
            a.poll_number
                .cmp(&b.poll_number)
                .then_with(|| a.riding.as_deref().unwrap_or("").cmp(b.riding.as_deref().unwrap_or("")))
                .then_with(|| a.province.as_deref().unwrap_or("").cmp(b.province.as_deref().unwrap_or("")))
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::from_millis;
    use serde_json::json;
    use tempfile::tempdir;

    fn mark(id: &str, code: &str, at: i64) -> VoteMark {
        VoteMark {
            id: id.to_string(),
            account_id: "acct".to_string(),
            contact_id: "c1".to_string(),
            poll_number: "101".to_string(),
            riding: None,
            province: None,
            marked_by: Some("u1".to_string()),
            verification_code: code.to_string(),
            notes: None,
            metadata: json!({}),
            marked_at: from_millis(at),
        }
    }

    #[tokio::test]
    async fn test_record_vote_appends_and_counts() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store.record_vote(&mark("vm1", "VA", 1_000)).await.unwrap();
        let turnout = store.record_vote(&mark("vm2", "VB", 1_000)).await.unwrap();
        assert_eq!(turnout.votes_cast, 2);
        assert_eq!(turnout.total_voters, 0);

        // Same timestamp: the later append comes first
        let page = store.vote_marks("acct", &VoteMarkFilter::default()).await.unwrap();
        let ids: Vec<&str> = page.items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["vm2", "vm1"]);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected_before_write() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store.record_vote(&mark("vm1", "VDUP", 1_000)).await.unwrap();
        let err = store.record_vote(&mark("vm2", "VDUP", 2_000)).await.unwrap_err();
        assert_eq!(err.code(), Some("DUPLICATE_VERIFICATION_CODE"));

        let page = store.vote_marks("acct", &VoteMarkFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(store.poll_turnout("acct").await.unwrap()[0].votes_cast, 1);
    }

    #[tokio::test]
    async fn test_total_voters_and_lookup() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let key = PollKey::new("101", None, None);

        store.record_vote(&mark("vm1", "VCODE1", 1_000)).await.unwrap();
        let row = store.set_total_voters("acct", &key, 400, Some("admin")).await.unwrap();
        assert_eq!(row.total_voters, 400);
        assert_eq!(row.votes_cast, 1);
        assert_eq!(store.poll_turnout("acct").await.unwrap().len(), 1);

        let found = store.find_vote_mark("acct", "VCODE1").await.unwrap();
        assert_eq!(found.map(|m| m.id), Some("vm1".to_string()));
        assert!(store.find_vote_mark("acct", "NOPE").await.unwrap().is_none());
    }
}
