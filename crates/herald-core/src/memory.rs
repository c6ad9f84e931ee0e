//! In-process [`FeedStore`] used for dry runs and tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Entry, EntryProbe, Feed, NewEntry, NewFeed};
use crate::traits::{FeedStore, FeedTransaction};

#[derive(Debug, Default)]
struct MemoryState {
    feeds: Vec<Feed>,
    entries: Vec<Entry>,
    locked: HashSet<Uuid>,
}

/// Feed store kept entirely in memory.
///
/// Transactions buffer their writes and apply them on commit. Row locks
/// taken with [`FeedTransaction::lock_feed_if_due`] are exclusive across
/// transactions and released on commit or drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fully-formed feed, bypassing uniqueness checks.
    pub async fn seed_feed(&self, feed: Feed) -> Feed {
        self.state().feeds.push(feed.clone());
        feed
    }

    /// All committed feeds in insertion order.
    pub async fn feeds(&self) -> Vec<Feed> {
        self.state().feeds.clone()
    }

    pub async fn feed(&self, feed_id: Uuid) -> Option<Feed> {
        self.state().feeds.iter().find(|f| f.id == feed_id).cloned()
    }

    /// Committed entries of a feed in insertion order.
    pub async fn entries_for(&self, feed_id: Uuid) -> Vec<Entry> {
        self.state()
            .entries
            .iter()
            .filter(|e| e.feed_id == feed_id)
            .cloned()
            .collect()
    }

    /// Mark a feed as locked by some other worker until [`Self::unlock`].
    pub async fn hold_lock(&self, feed_id: Uuid) -> bool {
        self.state().locked.insert(feed_id)
    }

    pub async fn unlock(&self, feed_id: Uuid) {
        self.state().locked.remove(&feed_id);
    }
}

impl FeedStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, AppError> {
        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            feeds: Vec::new(),
            entries: Vec::new(),
            locks: Vec::new(),
        })
    }

    async fn select_feeds_due(&self, now: DateTime<Utc>) -> Result<Vec<Feed>, AppError> {
        let mut due: Vec<Feed> = self
            .state()
            .feeds
            .iter()
            .filter(|f| f.next_check.is_some_and(|t| t <= now))
            .cloned()
            .collect();
        due.sort_by_key(|f| f.next_check);
        Ok(due)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Pending writes against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    /// Inserted or updated feeds, newest version last.
    feeds: Vec<Feed>,
    entries: Vec<Entry>,
    locks: Vec<Uuid>,
}

impl MemoryTransaction {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Committed feeds overlaid with this transaction's writes.
    fn visible_feeds(&self) -> Vec<Feed> {
        let mut feeds = self.state().feeds.clone();
        for pending in &self.feeds {
            match feeds.iter().position(|f| f.id == pending.id) {
                Some(pos) => feeds[pos] = pending.clone(),
                None => feeds.push(pending.clone()),
            }
        }
        feeds
    }
}

impl FeedTransaction for MemoryTransaction {
    async fn find_feed_by(
        &mut self,
        title: &str,
        feed_url: &str,
    ) -> Result<Option<Feed>, AppError> {
        Ok(self
            .visible_feeds()
            .into_iter()
            .find(|f| f.title == title && f.feed_url == feed_url))
    }

    async fn find_feed_by_url(&mut self, feed_url: &str) -> Result<Option<Feed>, AppError> {
        Ok(self
            .visible_feeds()
            .into_iter()
            .find(|f| f.feed_url == feed_url))
    }

    async fn lock_feed_if_due(
        &mut self,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Feed>, AppError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(feed) = state.feeds.iter().find(|f| f.id == feed_id).cloned() else {
            return Ok(None);
        };
        if !feed.next_check.is_some_and(|t| t <= now) {
            return Ok(None);
        }
        if !state.locked.insert(feed_id) {
            return Ok(None);
        }
        drop(state);

        self.locks.push(feed_id);
        Ok(Some(feed))
    }

    async fn insert_feed(&mut self, feed: &NewFeed) -> Result<Feed, AppError> {
        if self
            .visible_feeds()
            .iter()
            .any(|f| f.feed_url == feed.feed_url)
        {
            return Err(AppError::PersistenceConflict(format!(
                "feed_url '{}' already exists",
                feed.feed_url
            )));
        }

        let now = Utc::now();
        let stored = Feed {
            id: Uuid::new_v4(),
            title: feed.title.clone(),
            feed_url: feed.feed_url.clone(),
            description: feed.description.clone(),
            last_update: feed.last_update,
            last_checked: Some(feed.last_checked),
            next_check: Some(feed.next_check),
            last_status: feed.last_status,
            number_of_errors: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.feeds.push(stored.clone());
        Ok(stored)
    }

    async fn update_feed(&mut self, feed: &Feed) -> Result<Feed, AppError> {
        let mut stored = feed.clone();
        stored.updated_at = Utc::now();
        match self.feeds.iter().position(|f| f.id == feed.id) {
            Some(pos) => self.feeds[pos] = stored.clone(),
            None => {
                if !self.state().feeds.iter().any(|f| f.id == feed.id) {
                    return Err(AppError::DatabaseError(format!(
                        "feed {} not found",
                        feed.id
                    )));
                }
                self.feeds.push(stored.clone());
            }
        }
        Ok(stored)
    }

    async fn find_entry_matching(
        &mut self,
        feed_id: Uuid,
        probe: &EntryProbe,
    ) -> Result<Option<Entry>, AppError> {
        let committed = self
            .state()
            .entries
            .iter()
            .find(|e| e.feed_id == feed_id && probe.matches(e))
            .cloned();
        Ok(committed.or_else(|| {
            self.entries
                .iter()
                .find(|e| e.feed_id == feed_id && probe.matches(e))
                .cloned()
        }))
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<Entry, AppError> {
        let stored = Entry {
            id: Uuid::new_v4(),
            feed_id: entry.feed_id,
            title: entry.title.clone(),
            url: entry.url.clone(),
            guid: entry.guid.clone(),
            content: entry.content.clone(),
            publish_date: entry.publish_date,
            created_at: Utc::now(),
        };
        self.entries.push(stored.clone());
        Ok(stored)
    }

    async fn commit(mut self) -> Result<(), AppError> {
        let feeds = std::mem::take(&mut self.feeds);
        let entries = std::mem::take(&mut self.entries);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for feed in &feeds {
            let duplicate = state
                .feeds
                .iter()
                .any(|f| f.feed_url == feed.feed_url && f.id != feed.id);
            if duplicate {
                return Err(AppError::PersistenceConflict(format!(
                    "feed_url '{}' already exists",
                    feed.feed_url
                )));
            }
        }
        for feed in feeds {
            match state.feeds.iter().position(|f| f.id == feed.id) {
                Some(pos) => state.feeds[pos] = feed,
                None => state.feeds.push(feed),
            }
        }
        state.entries.extend(entries);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.locks.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for id in self.locks.drain(..) {
            state.locked.remove(&id);
        }
    }
}
