use chrono::{TimeDelta, Utc};
use herald_core::testutil::{MockFeedSource, status_fetch, valid_fetch};
use herald_core::{FeedCheckOutcome, IngestConfig, IngestService};

use crate::integration::common::setup_test_db;

const FEED_URL: &str = "http://example.org/rss";

async fn entry_count(db: &herald_db::Database) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
        .fetch_one(db.pool())
        .await
        .unwrap();
    count
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn create_feed_is_idempotent() {
    let (db, _container) = setup_test_db().await;
    let svc = IngestService::new(
        MockFeedSource::new(valid_fetch()),
        db.feed_store(),
        IngestConfig::default(),
    );

    let first = svc.create_feed(FEED_URL).await.unwrap();
    let second = svc.create_feed(FEED_URL).await.unwrap();

    assert_eq!(first.entries_added(), 1);
    assert_eq!(second.entries_added(), 0);
    assert_eq!(first.feed().unwrap().id, second.feed().unwrap().id);
    assert_eq!(entry_count(&db).await, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn concurrent_creates_produce_one_feed() {
    let (db, _container) = setup_test_db().await;
    let svc = IngestService::new(
        MockFeedSource::new(valid_fetch()),
        db.feed_store(),
        IngestConfig::default(),
    );

    let (a, b) = tokio::join!(svc.create_feed(FEED_URL), svc.create_feed(FEED_URL));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_success() && b.is_success());
    assert_eq!(a.feed().unwrap().id, b.feed().unwrap().id);
    let (feeds,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(feeds, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn rejected_feed_leaves_no_rows() {
    let (db, _container) = setup_test_db().await;
    let svc = IngestService::new(
        MockFeedSource::new(status_fetch(404, "application/xml")),
        db.feed_store(),
        IngestConfig::default(),
    );

    let outcome = svc.create_feed(FEED_URL).await.unwrap();

    assert!(matches!(outcome, FeedCheckOutcome::Rejected { .. }));
    let (feeds,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(feeds, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn refresh_records_failures_and_deactivates() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();
    let created = IngestService::new(
        MockFeedSource::new(valid_fetch()),
        store.clone(),
        IngestConfig::default(),
    )
    .create_feed(FEED_URL)
    .await
    .unwrap();
    let feed_id = created.feed().unwrap().id;

    let failing = IngestService::new(
        MockFeedSource::new(status_fetch(404, "application/xml")),
        store,
        IngestConfig::default().with_error_limit(1),
    );

    let mut at = Utc::now() + TimeDelta::hours(2);
    for _ in 0..2 {
        let outcomes = failing.refresh_due_feeds(at).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        at += TimeDelta::hours(2);
    }

    let (errors, active, status): (i32, bool, Option<i32>) = sqlx::query_as(
        "SELECT number_of_errors, is_active, last_status FROM feeds WHERE id = $1",
    )
    .bind(feed_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(errors, 2);
    assert!(!active);
    assert_eq!(status, Some(404));
}
