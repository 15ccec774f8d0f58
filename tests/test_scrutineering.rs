//! Integration tests for election-day flows
//!
//! Vote marking and turnout on both backends, the running tally, and the
//! per-call backend fallback.

#[cfg(test)]
mod scrutineering_tests {
    use scrutineer::store::VoteMarkFilter;
    use scrutineer::support::SupportCategory;
    use scrutineer::types::{
        from_millis, Contact, InteractionMethod, InteractionType, ListDraft, MarkVoteRequest,
        NewInteraction,
    };
    use scrutineer::{Engine, EngineConfig, StoreError};
    use serde_json::Value;
    use std::path::Path;
    use tempfile::tempdir;

    const ACCOUNT: &str = "acct-1";

    fn relational(root: &Path) -> Engine {
        Engine::open(EngineConfig::relational(root.join("scrutineer.db"), root.join("docs")))
    }

    fn document(root: &Path) -> Engine {
        Engine::open(EngineConfig::document(root.join("shared-data")))
    }

    fn mark(contact: &str) -> MarkVoteRequest {
        MarkVoteRequest {
            account_id: ACCOUNT.to_string(),
            contact_id: contact.to_string(),
            poll_number: "101".to_string(),
            riding: Some("R1".to_string()),
            province: Some("ON".to_string()),
            marked_by: Some("scrutineer-7".to_string()),
            ..Default::default()
        }
    }

    fn scored(contact: &str, score: i64) -> NewInteraction {
        NewInteraction {
            account_id: ACCOUNT.to_string(),
            contact_id: contact.to_string(),
            user_id: Some("canvasser".to_string()),
            interaction_type: InteractionType::PhoneCall,
            interaction_method: InteractionMethod::Phone,
            support_likelihood: Some(score),
            notes: Some("call back after 6".to_string()),
            metadata: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_double_mark_counts_twice_on_both_backends() {
        let dir = tempdir().unwrap();
        for engine in [relational(dir.path()), document(dir.path())] {
            let first = engine.audit.mark_vote(mark("c1")).await.unwrap();
            let second = engine.audit.mark_vote(mark("c1")).await.unwrap();
            assert_ne!(first.verification_code, second.verification_code);

            let turnout = engine.audit.get_poll_turnout(ACCOUNT).await.unwrap();
            assert_eq!(turnout.len(), 1);
            assert_eq!(turnout[0].poll_number, "101");
            assert_eq!(turnout[0].riding.as_deref(), Some("R1"));
            assert_eq!(turnout[0].province.as_deref(), Some("ON"));
            assert_eq!(turnout[0].votes_cast, 2);
            assert_eq!(turnout[0].total_voters, 0);

            let marks = engine
                .audit
                .get_vote_marks_by_poll(ACCOUNT, "101", Some("R1"), Some("ON"))
                .await
                .unwrap();
            assert_eq!(marks.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_marks_are_append_only_and_newest_first() {
        let dir = tempdir().unwrap();
        for engine in [relational(dir.path()), document(dir.path())] {
            let mut ids = Vec::new();
            for _ in 0..5 {
                ids.push(engine.audit.mark_vote(mark("c9")).await.unwrap().id);
            }
            ids.reverse();

            let page = engine
                .audit
                .get_vote_marks(ACCOUNT, &VoteMarkFilter::default())
                .await
                .unwrap();
            assert_eq!(page.total, 5);
            let listed: Vec<String> = page.items.into_iter().map(|m| m.id).collect();
            assert_eq!(listed, ids);

            let turnout = engine.audit.get_poll_turnout(ACCOUNT).await.unwrap();
            assert_eq!(turnout[0].votes_cast, 5);
        }
    }

    #[tokio::test]
    async fn test_turnout_is_monotonic_and_matches_mark_count() {
        let dir = tempdir().unwrap();
        let engine = relational(dir.path());

        let mut last = 0;
        for contact in ["a", "b", "c", "a"] {
            engine.audit.mark_vote(mark(contact)).await.unwrap();
            let cast = engine.audit.get_poll_turnout(ACCOUNT).await.unwrap()[0].votes_cast;
            assert!(cast > last);
            last = cast;
        }
        engine
            .audit
            .set_poll_total_voters(ACCOUNT, "101", Some("R1"), Some("ON"), 10, Some("admin"))
            .await
            .unwrap();

        let details = engine
            .audit
            .get_poll_turnout_details(ACCOUNT, "101", Some("R1"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.turnout.votes_cast, 4);
        assert_eq!(details.vote_count, 4);
        assert_eq!(details.turnout_percentage, 40.0);

        let search = VoteMarkFilter {
            contact_search: Some("A".to_string()),
            ..Default::default()
        };
        assert_eq!(engine.audit.get_vote_marks(ACCOUNT, &search).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_verify_accepts_display_format() {
        let dir = tempdir().unwrap();
        let engine = relational(dir.path());
        let marked = engine.audit.mark_vote(mark("c1")).await.unwrap();

        let display = scrutineer::audit::format_verification_code(&marked.verification_code);
        let found = engine.audit.verify_vote_mark(ACCOUNT, &display).await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(marked.id));
        assert!(engine.audit.verify_vote_mark(ACCOUNT, "V-NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tally_prefers_interaction_scores() {
        let dir = tempdir().unwrap();
        let engine = relational(dir.path());

        engine.tally.set_voted(ACCOUNT, "c1", Some("scrutineer-7")).await.unwrap();
        engine.interactions.record_interaction(scored("c1", 85)).await.unwrap();

        let tally = engine.tally.get_tally(ACCOUNT).await.unwrap();
        assert_eq!(tally.total_voted, 1);
        assert_eq!(tally.by_category.strong_support, 1);
        assert_eq!(tally.by_category.total(), 1);
        for category in [
            SupportCategory::LikelySupport,
            SupportCategory::Undecided,
            SupportCategory::LikelyOppose,
            SupportCategory::StrongOppose,
            SupportCategory::Unknown,
        ] {
            assert_eq!(tally.by_category.get(category), 0);
        }
        let outcome = tally.projected_outcome.unwrap();
        assert!(outcome.likely_win);
        assert_eq!(outcome.support_pct, 100);
    }

    #[tokio::test]
    async fn test_tally_falls_back_to_tags_on_document_backend() {
        let dir = tempdir().unwrap();
        let engine = document(dir.path());

        let mut opposed = Contact::new("c1", from_millis(1_000));
        opposed.categories = vec!["Newsletter".to_string(), "NDP member".to_string()];
        let mut fan = Contact::new("c2", from_millis(2_000));
        fan.categories = vec!["Strong Support".to_string()];
        let contacts = vec![opposed, fan];
        let contacts = &contacts;
        engine
            .contacts
            .run("seed", |store| async move { store.upsert_contacts(ACCOUNT, contacts).await })
            .await
            .unwrap();

        for id in ["c1", "c2", "c3"] {
            engine.tally.set_voted(ACCOUNT, id, None).await.unwrap();
        }

        let tally = engine.tally.get_tally(ACCOUNT).await.unwrap();
        let voted = engine.tally.get_voted_contact_ids(ACCOUNT).await.unwrap();
        assert_eq!(tally.total_voted, voted.len() as u64);
        assert_eq!(tally.by_category.total(), tally.total_voted);
        assert_eq!(tally.by_category.likely_oppose, 1);
        assert_eq!(tally.by_category.strong_support, 1);
        assert_eq!(tally.by_category.unknown, 1);
        assert!(!tally.projected_outcome.unwrap().likely_win);
    }

    #[tokio::test]
    async fn test_clear_all_voted() {
        let dir = tempdir().unwrap();
        for engine in [relational(dir.path()), document(dir.path())] {
            for id in ["v1", "v2", "v3", "v4", "v5"] {
                engine.tally.set_voted(ACCOUNT, id, None).await.unwrap();
            }
            assert!(engine.tally.is_contact_voted(ACCOUNT, "v3").await.unwrap());
            assert_eq!(engine.tally.clear_all_voted(ACCOUNT).await.unwrap(), 5);
            assert!(engine.tally.get_voted_contact_ids(ACCOUNT).await.unwrap().is_empty());

            let tally = engine.tally.get_tally(ACCOUNT).await.unwrap();
            assert_eq!(tally.total_voted, 0);
            assert!(tally.projected_outcome.is_none());
        }
    }

    #[tokio::test]
    async fn test_voted_flags_are_independent_of_vote_marks() {
        let dir = tempdir().unwrap();
        let engine = relational(dir.path());

        engine.audit.mark_vote(mark("c1")).await.unwrap();
        assert!(!engine.tally.is_contact_voted(ACCOUNT, "c1").await.unwrap());

        engine.tally.set_voted(ACCOUNT, "c1", None).await.unwrap();
        assert!(engine.tally.unset_voted(ACCOUNT, "c1").await.unwrap());
        let marks = engine.audit.get_vote_marks(ACCOUNT, &VoteMarkFilter::default()).await.unwrap();
        assert_eq!(marks.total, 1);
    }

    #[tokio::test]
    async fn test_interactions_require_relational_backend() {
        let dir = tempdir().unwrap();
        let engine = document(dir.path());

        let err = engine.interactions.record_interaction(scored("c1", 50)).await.unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable(_)));
        assert_eq!(err.code(), Some("BACKEND_UNAVAILABLE"));

        let categories = engine
            .interactions
            .get_support_categories_for_contacts(ACCOUNT, &["c1".to_string()])
            .await;
        assert!(categories.is_empty());
    }

    #[tokio::test]
    async fn test_readiness_is_rechecked_per_call() {
        let dir = tempdir().unwrap();
        let engine = relational(dir.path());

        let saved = engine
            .lists
            .save_list(ListDraft {
                account_id: ACCOUNT.to_string(),
                name: "Relational only".to_string(),
                is_shared: true,
                ..Default::default()
            })
            .await
            .unwrap();

        // Not ready: reads go to the (empty) document store
        engine.selector.mark_unready();
        assert!(engine.lists.get_list(ACCOUNT, &saved.id).await.unwrap().is_none());
        assert!(engine.interactions.get_last_contact_info(ACCOUNT, "c1").await.is_err());

        engine.selector.mark_ready();
        assert!(engine.lists.get_list(ACCOUNT, &saved.id).await.unwrap().is_some());
    }
}
