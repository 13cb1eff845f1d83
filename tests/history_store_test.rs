use chrono::{Duration, Utc};
use mockall::mock;
use mockall::predicate::always;

use query_profiler::analyzer::normalize::{fingerprint, normalize};
use query_profiler::history::split_operation_name;
use query_profiler::{
    HistoryFilter, HistoryStore, InMemoryHistoryStore, ProfilerError, Result, SessionSummary, Severity,
};

mod fixtures;
use fixtures::{create_sample_summary, create_test_profiler};

mock! {
    pub Store {}

    impl HistoryStore for Store {
        fn save(&self, summary: &SessionSummary) -> Result<()>;
        fn query(&self, filter: &HistoryFilter) -> Result<Vec<SessionSummary>>;
    }
}

#[test]
fn test_finished_sessions_reach_the_store() {
    let profiler = create_test_profiler(8);
    let store = InMemoryHistoryStore::new();

    for (name, queries) in [("PostListTest.test_list", 21), ("PostListTest.test_detail", 2)] {
        let handle = profiler.start(name, "view").unwrap();
        for _ in 0..queries {
            profiler.record_query();
        }
        profiler.finish_and_save(handle, &store).unwrap();
    }

    let all = store.query(&HistoryFilter::new().class("PostListTest")).unwrap();
    assert_eq!(all.len(), 2);

    let list = store.query(&HistoryFilter::new().method("test_list")).unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].verdict.is_pattern);
    assert_eq!(list[0].verdict.severity, Severity::High);

    let window = HistoryFilter::new().between(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1));
    assert_eq!(store.query(&window).unwrap().len(), 2);
    let future = HistoryFilter::new().between(Utc::now() + Duration::hours(1), Utc::now() + Duration::hours(2));
    assert!(store.query(&future).unwrap().is_empty());
}

#[test]
fn test_back_to_back_sessions_keep_their_own_signature() {
    let profiler = create_test_profiler(4);
    let store = InMemoryHistoryStore::new();

    let comments = profiler.start("PostListTest.test_comments", "view").unwrap();
    for post_id in 1..=20 {
        let query = format!("SELECT * FROM comments WHERE post_id = {}", post_id);
        profiler.observe_query(query.as_str(), 0.4).unwrap();
    }
    let comments = profiler.finish_and_save(comments, &store).unwrap();

    let tags = profiler.start("TagListTest.test_tags", "view").unwrap();
    for _ in 0..2 {
        profiler.observe_query("SELECT * FROM tags", 0.4).unwrap();
    }
    let tags = profiler.finish_and_save(tags, &store).unwrap();

    assert_eq!(
        comments.dominant_signature,
        Some(fingerprint(&normalize("SELECT * FROM comments WHERE post_id = 1", true)))
    );
    assert_eq!(tags.dominant_signature, Some(fingerprint("select * from tags")));
    assert_ne!(comments.dominant_signature, tags.dominant_signature);

    let saved = store.query(&HistoryFilter::new().class("TagListTest")).unwrap();
    assert_eq!(saved[0].dominant_signature, tags.dominant_signature);
    // the analyzer still remembers both shapes
    assert_eq!(profiler.statistics().total_queries, 22);
}

#[test]
fn test_mock_store_is_called_once_per_session() {
    let profiler = create_test_profiler(2);
    let mut store = MockStore::new();
    store.expect_save().with(always()).times(2).returning(|_| Ok(()));
    store.expect_query().never();

    for _ in 0..2 {
        let handle = profiler.start("CheckoutTest.test_pay", "view").unwrap();
        profiler.finish_and_save(handle, &store).unwrap();
    }
}

#[test]
fn test_store_errors_surface_to_caller() {
    let profiler = create_test_profiler(2);
    let mut store = MockStore::new();
    store
        .expect_save()
        .returning(|_| Err(ProfilerError::Storage("history file is read-only".to_string())));

    let handle = profiler.start("CheckoutTest.test_pay", "view").unwrap();
    let err = profiler.finish_and_save(handle, &store).unwrap_err();
    assert!(err.to_string().contains("read-only"));
}

#[test]
fn test_summary_serialization() {
    let summary = create_sample_summary("api::orders::list", 55);
    assert_eq!(summary.class_name(), Some("api::orders"));
    assert_eq!(split_operation_name("api::orders::list").1, "list");

    let json = summary.to_json().unwrap();
    assert!(json.contains("\"severity\":\"critical\""));
    assert_eq!(SessionSummary::from_json(&json).unwrap(), summary);
}
