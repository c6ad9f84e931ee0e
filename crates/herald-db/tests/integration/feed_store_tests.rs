use chrono::{TimeDelta, Utc};
use herald_core::models::{EntryProbe, NewEntry, NewFeed, ParsedItem};
use herald_core::traits::{FeedStore, FeedTransaction};
use herald_core::AppError;

use crate::integration::common::setup_test_db;

fn new_feed(url: &str) -> NewFeed {
    let now = Utc::now();
    NewFeed {
        title: "Sample Feed".into(),
        feed_url: url.into(),
        description: "For documentation only".into(),
        last_update: None,
        last_checked: now,
        next_check: now - TimeDelta::seconds(1),
        last_status: Some(200),
    }
}

fn probe(link: Option<&str>, guid: Option<&str>, title: Option<&str>) -> EntryProbe {
    EntryProbe::from_item(&ParsedItem {
        link: link.map(String::from),
        id: guid.map(String::from),
        title: title.map(String::from),
        ..Default::default()
    })
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn insert_and_find_feed() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();

    let mut tx = store.begin().await.unwrap();
    let feed = tx.insert_feed(&new_feed("http://example.org/rss")).await.unwrap();
    tx.commit().await.unwrap();

    assert!(!feed.id.is_nil());
    assert_eq!(feed.number_of_errors, 0);
    assert!(feed.is_active);
    assert_eq!(feed.last_status, Some(200));

    let mut tx = store.begin().await.unwrap();
    let found = tx
        .find_feed_by("Sample Feed", "http://example.org/rss")
        .await
        .unwrap()
        .expect("feed should exist");
    assert_eq!(found.id, feed.id);
    assert!(
        tx.find_feed_by("Other title", "http://example.org/rss")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn duplicate_url_is_a_conflict() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();

    let mut tx = store.begin().await.unwrap();
    tx.insert_feed(&new_feed("http://example.org/rss")).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_feed(&new_feed("http://example.org/rss"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PersistenceConflict(_)));
    // The transaction is still usable after ON CONFLICT DO NOTHING.
    assert!(
        tx.find_feed_by_url("http://example.org/rss")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn rollback_on_drop() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_feed(&new_feed("http://example.org/rss")).await.unwrap();
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn entry_probe_matches_all_present_fields() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();

    let mut tx = store.begin().await.unwrap();
    let feed = tx.insert_feed(&new_feed("http://example.org/rss")).await.unwrap();
    let stored = tx
        .insert_entry(&NewEntry {
            feed_id: feed.id,
            title: Some("First entry title".into()),
            url: Some("http://example.org/entry/3".into()),
            guid: Some("http://example.org/entry/3".into()),
            content: String::new(),
            publish_date: None,
        })
        .await
        .unwrap();

    let hit = tx
        .find_entry_matching(
            feed.id,
            &probe(
                Some("http://example.org/entry/3"),
                Some("http://example.org/entry/3"),
                Some("First entry title"),
            ),
        )
        .await
        .unwrap();
    assert_eq!(hit.map(|e| e.id), Some(stored.id));

    let title_only = tx
        .find_entry_matching(feed.id, &probe(None, None, Some("First entry title")))
        .await
        .unwrap();
    assert!(title_only.is_some());

    let retitled = tx
        .find_entry_matching(
            feed.id,
            &probe(Some("http://example.org/entry/3"), None, Some("Renamed")),
        )
        .await
        .unwrap();
    assert!(retitled.is_none());

    let empty = tx
        .find_entry_matching(feed.id, &EntryProbe::default())
        .await
        .unwrap();
    assert!(empty.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn locked_feed_is_skipped_by_other_transactions() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();

    let mut tx = store.begin().await.unwrap();
    let feed = tx.insert_feed(&new_feed("http://example.org/rss")).await.unwrap();
    tx.commit().await.unwrap();

    let now = Utc::now();
    let mut first = store.begin().await.unwrap();
    assert!(first.lock_feed_if_due(feed.id, now).await.unwrap().is_some());

    let mut second = store.begin().await.unwrap();
    assert!(second.lock_feed_if_due(feed.id, now).await.unwrap().is_none());

    first.commit().await.unwrap();
    assert!(second.lock_feed_if_due(feed.id, now).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn select_due_and_update() {
    let (db, _container) = setup_test_db().await;
    let store = db.feed_store();

    let mut tx = store.begin().await.unwrap();
    let due = tx.insert_feed(&new_feed("http://due.example/rss")).await.unwrap();
    let mut later = new_feed("http://later.example/rss");
    later.next_check = Utc::now() + TimeDelta::hours(1);
    tx.insert_feed(&later).await.unwrap();
    tx.commit().await.unwrap();

    let selected = store.select_feeds_due(Utc::now()).await.unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, due.id);

    let mut updated = selected[0].clone();
    updated.number_of_errors = 3;
    updated.is_active = false;
    updated.last_status = None;
    updated.next_check = Some(Utc::now() + TimeDelta::hours(1));

    let mut tx = store.begin().await.unwrap();
    let stored = tx.update_feed(&updated).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stored.number_of_errors, 3);
    assert!(!stored.is_active);
    assert_eq!(stored.last_status, None);
    assert!(store.select_feeds_due(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ping_succeeds() {
    let (db, _container) = setup_test_db().await;
    db.feed_store().ping().await.unwrap();
}
