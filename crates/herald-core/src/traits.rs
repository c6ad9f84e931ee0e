use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Entry, EntryProbe, Feed, FetchResult, NewEntry, NewFeed};

/// Fetches and parses a feed document from a URL.
///
/// Returns `Ok` whenever an HTTP response arrived, whatever its status;
/// `Err` only when no response could be obtained (DNS, connect, timeout,
/// disallowed address).
pub trait FeedSource: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResult, AppError>> + Send;
}

/// Persists feeds and entries.
///
/// All writes go through a [`FeedTransaction`]; reads that drive scheduling
/// are available directly on the store.
pub trait FeedStore: Send + Sync + Clone {
    type Tx: FeedTransaction;

    /// Open a transaction. Dropping it without [`FeedTransaction::commit`]
    /// rolls back every write made through it.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, AppError>> + Send;

    /// Feeds whose `next_check` is at or before `now`, oldest first.
    fn select_feeds_due(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Feed>, AppError>> + Send;

    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A unit of work against a [`FeedStore`].
pub trait FeedTransaction: Send {
    /// Look up a feed by exact title and URL.
    fn find_feed_by(
        &mut self,
        title: &str,
        feed_url: &str,
    ) -> impl Future<Output = Result<Option<Feed>, AppError>> + Send;

    fn find_feed_by_url(
        &mut self,
        feed_url: &str,
    ) -> impl Future<Output = Result<Option<Feed>, AppError>> + Send;

    /// Lock a feed for the rest of the transaction if it is still due at `now`.
    ///
    /// Returns `None` when the feed is gone, no longer due, or already
    /// locked by another worker. Never waits for a lock.
    fn lock_feed_if_due(
        &mut self,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Feed>, AppError>> + Send;

    /// Insert a feed. Fails with [`AppError::PersistenceConflict`] when a feed
    /// with the same URL already exists.
    fn insert_feed(
        &mut self,
        feed: &NewFeed,
    ) -> impl Future<Output = Result<Feed, AppError>> + Send;

    /// Persist the mutable fields of a feed and return the stored row.
    fn update_feed(&mut self, feed: &Feed) -> impl Future<Output = Result<Feed, AppError>> + Send;

    /// First entry of the feed whose fields equal every probe field.
    fn find_entry_matching(
        &mut self,
        feed_id: Uuid,
        probe: &EntryProbe,
    ) -> impl Future<Output = Result<Option<Entry>, AppError>> + Send;

    fn insert_entry(
        &mut self,
        entry: &NewEntry,
    ) -> impl Future<Output = Result<Entry, AppError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), AppError>> + Send;
}
