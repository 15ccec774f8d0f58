//! Vote marking and turnout reporting
//!
//! `mark_vote` appends to the audit log and bumps the poll's `votes_cast`.
//! Writes go to the active backend only: an audit write never lands in the
//! document store because the relational one hiccuped. Reads fall back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backend::Dispatcher;
use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::ids::generate_id;
use crate::segment::filter::validate_poll_number;
use crate::store::{validate_account_id, validate_contact_id, AuditStore, VoteMarkFilter};
use crate::types::{now, to_millis, MarkVoteRequest, Page, PollKey, PollTurnout, VoteMark};

use super::verification::{generate_verification_code, normalize_verification_code};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoutTotals {
    pub total_voters: i64,
    pub total_votes_cast: i64,
    /// Two decimals; 0 when no voter total has been entered
    pub turnout_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoutSummary {
    pub polls: Vec<PollTurnout>,
    pub totals: TurnoutTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollTurnoutDetails {
    pub turnout: PollTurnout,
    pub vote_marks: Vec<VoteMark>,
    pub vote_count: usize,
    pub turnout_percentage: f64,
}

/// `cast / total * 100` to two decimals
fn turnout_percentage(votes_cast: i64, total_voters: i64) -> f64 {
    if total_voters <= 0 {
        return 0.0;
    }
    let pct = votes_cast as f64 / total_voters as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Clone)]
pub struct AuditLog {
    store: Dispatcher<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Dispatcher<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append a vote mark and increment turnout for its poll key
    ///
    /// Not idempotent: marking the same contact twice records two marks and
    /// counts two votes.
    pub async fn mark_vote(&self, request: MarkVoteRequest) -> StoreResult<VoteMark> {
        validate_account_id(&request.account_id)?;
        validate_contact_id(&request.contact_id)?;
        let poll_number = request.poll_number.trim().to_string();
        validate_poll_number(&poll_number)?;

        let marked_at = now();
        let millis = to_millis(&marked_at);
        let store = self.store.active();
        let supplied = request
            .verification_code
            .as_deref()
            .map(normalize_verification_code)
            .filter(|code| !code.is_empty());
        let verification_code = match supplied {
            Some(code) => code,
            None => {
                unused_code(&*store, &request.account_id, || {
                    generate_verification_code(millis)
                })
                .await?
            }
        };

        let mark = VoteMark {
            id: generate_id("vm", millis),
            account_id: request.account_id,
            contact_id: request.contact_id,
            poll_number,
            riding: blank_to_none(request.riding.as_deref()).map(str::to_string),
            province: blank_to_none(request.province.as_deref()).map(str::to_string),
            marked_by: request.marked_by,
            verification_code,
            notes: request.notes,
            metadata: metadata_object(request.metadata.unwrap_or(Value::Null)),
            marked_at,
        };

        let turnout = store.record_vote(&mark).await?;
        log::info!(
            "🗳️  Vote marked for contact {} at poll {} (account {}, code {}, votes cast {})",
            mark.contact_id,
            mark.poll_number,
            mark.account_id,
            mark.verification_code,
            turnout.votes_cast
        );
        Ok(mark)
    }

    /// Set the externally supplied voter total for a poll key
    pub async fn set_poll_total_voters(
        &self,
        account_id: &str,
        poll_number: &str,
        riding: Option<&str>,
        province: Option<&str>,
        total_voters: i64,
        updated_by: Option<&str>,
    ) -> StoreResult<PollTurnout> {
        validate_account_id(account_id)?;
        let poll_number = poll_number.trim();
        validate_poll_number(poll_number)?;
        if total_voters < 0 {
            return Err(StoreError::validation(
                ValidationCode::InvalidTotalVoters,
                format!("total voters must not be negative, got {}", total_voters),
            ));
        }

        let key = PollKey::new(poll_number, blank_to_none(riding), blank_to_none(province));
        let row = self
            .store
            .active()
            .set_total_voters(account_id, &key, total_voters, updated_by)
            .await?;
        log::info!(
            "✅ Poll {} total voters set to {} for account {}",
            key.poll_number,
            total_voters,
            account_id
        );
        Ok(row)
    }

    /// Every mark for a poll; riding/province narrow only when given
    pub async fn get_vote_marks_by_poll(
        &self,
        account_id: &str,
        poll_number: &str,
        riding: Option<&str>,
        province: Option<&str>,
    ) -> StoreResult<Vec<VoteMark>> {
        let filter = VoteMarkFilter {
            poll_number: Some(poll_number.to_string()),
            riding: blank_to_none(riding).map(str::to_string),
            province: blank_to_none(province).map(str::to_string),
            limit: usize::MAX,
            ..Default::default()
        };
        Ok(self.get_vote_marks(account_id, &filter).await?.items)
    }

    /// Filtered, paginated, most recent first
    pub async fn get_vote_marks(&self, account_id: &str, filter: &VoteMarkFilter) -> StoreResult<Page<VoteMark>> {
        validate_account_id(account_id)?;
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(StoreError::validation(
                    ValidationCode::InvalidDateRange,
                    "startDate is later than endDate",
                ));
            }
        }

        self.store
            .run("getVoteMarks", |store| async move { store.vote_marks(account_id, filter).await })
            .await
    }

    /// Accepts display-formatted codes (`vloy-w3v2-...`)
    pub async fn verify_vote_mark(&self, account_id: &str, code: &str) -> StoreResult<Option<VoteMark>> {
        validate_account_id(account_id)?;
        let code = &normalize_verification_code(code);
        if code.is_empty() {
            return Ok(None);
        }

        self.store
            .run("verifyVoteMark", |store| async move { store.find_vote_mark(account_id, code).await })
            .await
    }

    pub async fn get_poll_turnout(&self, account_id: &str) -> StoreResult<Vec<PollTurnout>> {
        validate_account_id(account_id)?;
        self.store
            .run("getPollTurnout", |store| async move { store.poll_turnout(account_id).await })
            .await
    }

    /// Turnout rows (optionally narrowed by riding/province) plus totals
    pub async fn get_turnout_summary(
        &self,
        account_id: &str,
        riding: Option<&str>,
        province: Option<&str>,
    ) -> StoreResult<TurnoutSummary> {
        let riding = blank_to_none(riding);
        let province = blank_to_none(province);
        let polls: Vec<PollTurnout> = self
            .get_poll_turnout(account_id)
            .await?
            .into_iter()
            .filter(|p| riding.map_or(true, |r| p.riding.as_deref() == Some(r)))
            .filter(|p| province.map_or(true, |v| p.province.as_deref() == Some(v)))
            .collect();

        let total_voters: i64 = polls.iter().map(|p| p.total_voters).sum();
        let total_votes_cast: i64 = polls.iter().map(|p| p.votes_cast).sum();
        Ok(TurnoutSummary {
            totals: TurnoutTotals {
                total_voters,
                total_votes_cast,
                turnout_percentage: turnout_percentage(total_votes_cast, total_voters),
            },
            polls,
        })
    }

    /// `None` for an unknown poll key
    pub async fn get_poll_turnout_details(
        &self,
        account_id: &str,
        poll_number: &str,
        riding: Option<&str>,
        province: Option<&str>,
    ) -> StoreResult<Option<PollTurnoutDetails>> {
        let riding = blank_to_none(riding);
        let province = blank_to_none(province);
        let Some(turnout) = self
            .get_poll_turnout(account_id)
            .await?
            .into_iter()
            .find(|p| p.key().matches(poll_number, riding, province))
        else {
            return Ok(None);
        };

        let vote_marks = self
            .get_vote_marks_by_poll(account_id, poll_number, riding, province)
            .await?;
        Ok(Some(PollTurnoutDetails {
            turnout_percentage: turnout_percentage(turnout.votes_cast, turnout.total_voters),
            vote_count: vote_marks.len(),
            vote_marks,
            turnout,
        }))
    }
}

/// A generated code, drawn a second time if the first is already on record
/// for this account. Only 4 random characters separate codes minted in the
/// same millisecond.
async fn unused_code(
    store: &dyn AuditStore,
    account_id: &str,
    mut generate: impl FnMut() -> String,
) -> StoreResult<String> {
    let code = generate();
    if store.find_vote_mark(account_id, &code).await?.is_none() {
        return Ok(code);
    }
    log::debug!("Verification code {} already issued, drawing another", code);
    Ok(generate())
}

/// Opaque metadata is stored as-is; anything but an object is wrapped
pub(crate) fn metadata_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        Value::Null => json!({}),
        other => json!({ "value": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendSelector;
    use crate::store::DocumentStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn audit_log(root: &std::path::Path) -> AuditLog {
        let document: Arc<dyn AuditStore> = Arc::new(DocumentStore::new(root));
        AuditLog::new(Dispatcher::new(
            Arc::new(BackendSelector::document_only()),
            None,
            document,
        ))
    }

    fn request(contact: &str, poll: &str) -> MarkVoteRequest {
        MarkVoteRequest {
            account_id: "acct".to_string(),
            contact_id: contact.to_string(),
            poll_number: poll.to_string(),
            riding: Some("R1".to_string()),
            province: Some("ON".to_string()),
            marked_by: Some("scrutineer-1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_turnout_percentage_rounding() {
        assert_eq!(turnout_percentage(1, 3), 33.33);
        assert_eq!(turnout_percentage(2, 3), 66.67);
        assert_eq!(turnout_percentage(5, 0), 0.0);
    }

    #[tokio::test]
    async fn test_mark_vote_validates_input() {
        let dir = tempdir().unwrap();
        let log = audit_log(dir.path());

        let err = log.mark_vote(request("", "101")).await.unwrap_err();
        assert_eq!(err.code(), Some("INVALID_CONTACT_ID"));

        let err = log.mark_vote(request("c1", "not a poll")).await.unwrap_err();
        assert_eq!(err.code(), Some("INVALID_POLL_NUMBER"));

        let err = log
            .set_poll_total_voters("acct", "101", None, None, -1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("INVALID_TOTAL_VOTERS"));
    }

    #[tokio::test]
    async fn test_mark_vote_generates_code_and_metadata() {
        let dir = tempdir().unwrap();
        let log = audit_log(dir.path());

        let mark = log.mark_vote(request("c1", "101")).await.unwrap();
        assert!(mark.id.starts_with("vm_"));
        assert!(mark.verification_code.starts_with('V'));
        assert_eq!(mark.metadata, json!({}));

        let display = crate::audit::format_verification_code(&mark.verification_code).to_lowercase();
        let found = log.verify_vote_mark("acct", &display).await.unwrap().unwrap();
        assert_eq!(found.id, mark.id);
    }

    #[tokio::test]
    async fn test_supplied_code_is_normalized() {
        let dir = tempdir().unwrap();
        let log = audit_log(dir.path());

        let mark = log
            .mark_vote(MarkVoteRequest {
                verification_code: Some("vabc-1234".to_string()),
                ..request("c1", "101")
            })
            .await
            .unwrap();
        assert_eq!(mark.verification_code, "VABC1234");

        let dup = log
            .mark_vote(MarkVoteRequest {
                verification_code: Some("VABC1234".to_string()),
                ..request("c2", "101")
            })
            .await
            .unwrap_err();
        assert_eq!(dup.code(), Some("DUPLICATE_VERIFICATION_CODE"));
    }

    #[tokio::test]
    async fn test_summary_and_details() {
        let dir = tempdir().unwrap();
        let log = audit_log(dir.path());

        log.mark_vote(request("c1", "101")).await.unwrap();
        log.mark_vote(request("c2", "101")).await.unwrap();
        log.mark_vote(request("c3", "202")).await.unwrap();
        log.set_poll_total_voters("acct", "101", Some("R1"), Some("ON"), 8, None)
            .await
            .unwrap();

        let summary = log.get_turnout_summary("acct", Some("R1"), None).await.unwrap();
        assert_eq!(summary.polls.len(), 2);
        assert_eq!(summary.totals.total_votes_cast, 3);
        assert_eq!(summary.totals.total_voters, 8);
        assert_eq!(summary.totals.turnout_percentage, 37.5);

        let details = log
            .get_poll_turnout_details("acct", "101", None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.vote_count, 2);
        assert_eq!(details.turnout_percentage, 25.0);

        assert!(log
            .get_poll_turnout_details("acct", "999", None, None)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_metadata_object_wraps_scalars() {
        assert_eq!(metadata_object(Value::Null), json!({}));
        assert_eq!(metadata_object(json!(3)), json!({ "value": 3 }));
        assert_eq!(metadata_object(json!({ "a": 1 })), json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_generated_code_is_redrawn_when_already_issued() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let log = audit_log(dir.path());
        let first = log.mark_vote(request("c1", "101")).await.unwrap();

        let mut draws = vec!["VFRESH".to_string(), first.verification_code.clone()];
        let code = unused_code(&store, "acct", || draws.pop().unwrap()).await.unwrap();
        assert_eq!(code, "VFRESH");

        let mut draws = vec!["VUNUSED".to_string()];
        let code = unused_code(&store, "acct", || draws.pop().unwrap()).await.unwrap();
        assert_eq!(code, "VUNUSED");
    }
}
