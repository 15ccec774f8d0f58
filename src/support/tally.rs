//! Running election-night tally
//!
//! Voted flags are mutable per-account state, unrelated to the immutable
//! vote-mark log. Each voted contact lands in exactly one bucket, resolved
//! by precedence: interaction average, then first recognised tag, then
//! unknown.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::backend::Dispatcher;
use crate::error::StoreResult;
use crate::store::{validate_account_id, validate_contact_id, ContactDirectory, VotedStore};
use crate::types::{Contact, VotedEntry};

use super::{InteractionAggregator, SupportCategory};

/// Histogram over the six buckets; every key is always present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByCategory {
    pub strong_support: u64,
    pub likely_support: u64,
    pub undecided: u64,
    pub likely_oppose: u64,
    pub strong_oppose: u64,
    pub unknown: u64,
}

impl ByCategory {
    fn slot(&mut self, category: SupportCategory) -> &mut u64 {
        match category {
            SupportCategory::StrongSupport => &mut self.strong_support,
            SupportCategory::LikelySupport => &mut self.likely_support,
            SupportCategory::Undecided => &mut self.undecided,
            SupportCategory::LikelyOppose => &mut self.likely_oppose,
            SupportCategory::StrongOppose => &mut self.strong_oppose,
            SupportCategory::Unknown => &mut self.unknown,
        }
    }

    pub fn add(&mut self, category: SupportCategory) {
        *self.slot(category) += 1;
    }

    pub fn get(&self, category: SupportCategory) -> u64 {
        match category {
            SupportCategory::StrongSupport => self.strong_support,
            SupportCategory::LikelySupport => self.likely_support,
            SupportCategory::Undecided => self.undecided,
            SupportCategory::LikelyOppose => self.likely_oppose,
            SupportCategory::StrongOppose => self.strong_oppose,
            SupportCategory::Unknown => self.unknown,
        }
    }

    fn sum_where(&self, keep: impl Fn(&SupportCategory) -> bool) -> u64 {
        SupportCategory::SCORED
            .iter()
            .copied()
            .chain(std::iter::once(SupportCategory::Unknown))
            .filter(|c| keep(c))
            .map(|c| self.get(c))
            .sum()
    }

    pub fn total(&self) -> u64 {
        self.sum_where(|_| true)
    }

    pub fn support(&self) -> u64 {
        self.sum_where(SupportCategory::is_support)
    }

    pub fn oppose(&self) -> u64 {
        self.sum_where(SupportCategory::is_oppose)
    }
}

/// Percentages are rounded independently and need not sum to 100
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedOutcome {
    pub support_pct: u64,
    pub oppose_pct: u64,
    pub undecided_pct: u64,
    pub unknown_pct: u64,
    pub likely_win: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub total_voted: u64,
    pub by_category: ByCategory,
    /// `None` until at least one contact has voted
    pub projected_outcome: Option<ProjectedOutcome>,
}

fn pct(part: u64, total: u64) -> u64 {
    (part as f64 / total as f64 * 100.0).round() as u64
}

/// Resolve one contact's bucket
fn effective_category(
    contact_id: &str,
    from_interactions: &HashMap<String, SupportCategory>,
    contacts: &HashMap<&str, &Contact>,
) -> SupportCategory {
    if let Some(category) = from_interactions.get(contact_id) {
        if *category != SupportCategory::Unknown {
            return *category;
        }
    }
    contacts
        .get(contact_id)
        .and_then(|c| SupportCategory::from_tags(&c.categories))
        .unwrap_or(SupportCategory::Unknown)
}

pub fn build_tally(
    voted_ids: &[String],
    from_interactions: &HashMap<String, SupportCategory>,
    contacts: &[Contact],
) -> Tally {
    let by_id: HashMap<&str, &Contact> = contacts.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut by_category = ByCategory::default();
    for id in voted_ids {
        by_category.add(effective_category(id, from_interactions, &by_id));
    }

    let total_voted = voted_ids.len() as u64;
    let projected_outcome = (total_voted > 0).then(|| ProjectedOutcome {
        support_pct: pct(by_category.support(), total_voted),
        oppose_pct: pct(by_category.oppose(), total_voted),
        undecided_pct: pct(by_category.undecided, total_voted),
        unknown_pct: pct(by_category.unknown, total_voted),
        likely_win: by_category.support() > by_category.oppose(),
    });

    Tally {
        total_voted,
        by_category,
        projected_outcome,
    }
}

#[derive(Clone)]
pub struct TallyEngine {
    voted: Dispatcher<dyn VotedStore>,
    contacts: Dispatcher<dyn ContactDirectory>,
    interactions: InteractionAggregator,
}

impl TallyEngine {
    pub fn new(
        voted: Dispatcher<dyn VotedStore>,
        contacts: Dispatcher<dyn ContactDirectory>,
        interactions: InteractionAggregator,
    ) -> Self {
        Self {
            voted,
            contacts,
            interactions,
        }
    }

    pub async fn set_voted(
        &self,
        account_id: &str,
        contact_id: &str,
        marked_by: Option<&str>,
    ) -> StoreResult<VotedEntry> {
        validate_account_id(account_id)?;
        validate_contact_id(contact_id)?;
        self.voted
            .run("setVoted", |store| async move {
                store.set_voted(account_id, contact_id, marked_by).await
            })
            .await
    }

    /// `false` when the contact was not flagged
    pub async fn unset_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool> {
        validate_account_id(account_id)?;
        validate_contact_id(contact_id)?;
        self.voted
            .run("unsetVoted", |store| async move { store.unset_voted(account_id, contact_id).await })
            .await
    }

    /// Reset between elections; returns how many flags were cleared
    pub async fn clear_all_voted(&self, account_id: &str) -> StoreResult<usize> {
        validate_account_id(account_id)?;
        self.voted
            .run("clearAllVoted", |store| async move { store.clear_all_voted(account_id).await })
            .await
    }

    pub async fn is_contact_voted(&self, account_id: &str, contact_id: &str) -> StoreResult<bool> {
        validate_account_id(account_id)?;
        self.voted
            .run("isContactVoted", |store| async move { store.is_voted(account_id, contact_id).await })
            .await
    }

    pub async fn get_voted_contact_ids(&self, account_id: &str) -> StoreResult<Vec<String>> {
        validate_account_id(account_id)?;
        self.voted
            .run("getVotedContactIds", |store| async move { store.voted_contact_ids(account_id).await })
            .await
    }

    /// Tally over the account's voted flags
    pub async fn get_tally(&self, account_id: &str) -> StoreResult<Tally> {
        let voted_ids = self.get_voted_contact_ids(account_id).await?;
        self.tally_for_contacts(account_id, &voted_ids).await
    }

    /// Tally over an externally supplied voted set
    pub async fn tally_for_contacts(&self, account_id: &str, voted_ids: &[String]) -> StoreResult<Tally> {
        validate_account_id(account_id)?;
        if voted_ids.is_empty() {
            return Ok(build_tally(&[], &HashMap::new(), &[]));
        }

        let from_interactions = self
            .interactions
            .get_support_categories_for_contacts(account_id, voted_ids)
            .await;
        let contacts = self
            .contacts
            .run("getTally", |store| async move {
                store.contacts_by_ids(account_id, voted_ids).await
            })
            .await?;

        let tally = build_tally(voted_ids, &from_interactions, &contacts);
        log::debug!(
            "Tally for account {}: {} voted, {} support / {} oppose",
            account_id,
            tally.total_voted,
            tally.by_category.support(),
            tally.by_category.oppose()
        );
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::from_millis;

    fn tagged(id: &str, tags: &[&str]) -> Contact {
        let mut c = Contact::new(id, from_millis(0));
        c.categories = tags.iter().map(|t| t.to_string()).collect();
        c
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_interaction_bucket_beats_tags() {
        let contacts = vec![tagged("c1", &["Opposed"])];
        let scores = HashMap::from([("c1".to_string(), SupportCategory::StrongSupport)]);
        let tally = build_tally(&ids(&["c1"]), &scores, &contacts);
        assert_eq!(tally.by_category.strong_support, 1);
        assert_eq!(tally.by_category.strong_oppose, 0);
    }

    #[test]
    fn test_first_recognised_tag_wins() {
        let contacts = vec![
            tagged("c1", &["Newsletter", "Volunteer", "Opposed"]),
            tagged("c2", &["Newsletter"]),
            tagged("c3", &["undecided"]),
        ];
        let tally = build_tally(&ids(&["c1", "c2", "c3", "ghost"]), &HashMap::new(), &contacts);

        assert_eq!(tally.by_category.likely_support, 1);
        assert_eq!(tally.by_category.undecided, 1);
        assert_eq!(tally.by_category.unknown, 2);
        assert_eq!(tally.by_category.total(), tally.total_voted);
    }

    #[test]
    fn test_projection_percentages() {
        let contacts = vec![
            tagged("a", &["Supporter"]),
            tagged("b", &["Supporter"]),
            tagged("c", &["Opposed"]),
        ];
        let tally = build_tally(&ids(&["a", "b", "c"]), &HashMap::new(), &contacts);
        let outcome = tally.projected_outcome.unwrap();
        assert_eq!(outcome.support_pct, 67);
        assert_eq!(outcome.oppose_pct, 33);
        assert_eq!(outcome.undecided_pct, 0);
        assert!(outcome.likely_win);
    }

    #[test]
    fn test_empty_tally_has_no_projection() {
        let tally = build_tally(&[], &HashMap::new(), &[]);
        assert_eq!(tally.total_voted, 0);
        assert!(tally.projected_outcome.is_none());
        assert_eq!(tally.by_category, ByCategory::default());
    }

    #[test]
    fn test_tie_is_not_a_win() {
        let contacts = vec![tagged("a", &["Supporter"]), tagged("b", &["Opposed"])];
        let tally = build_tally(&ids(&["a", "b"]), &HashMap::new(), &contacts);
        assert!(!tally.projected_outcome.unwrap().likely_win);
    }

    #[test]
    fn test_support_and_oppose_group_strong_and_likely() {
        let mut counts = ByCategory::default();
        for category in [
            SupportCategory::StrongSupport,
            SupportCategory::LikelySupport,
            SupportCategory::LikelySupport,
            SupportCategory::StrongOppose,
            SupportCategory::Undecided,
            SupportCategory::Unknown,
        ] {
            counts.add(category);
        }
        assert_eq!(counts.support(), 3);
        assert_eq!(counts.oppose(), 1);
        assert_eq!(counts.total(), 6);
    }
}
