use chrono::{DateTime, Utc};
use futures::StreamExt;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::{AppError, duration_ms};
use crate::health::HealthTracker;
use crate::models::{Feed, FeedCheckOutcome, FetchResult, NewFeed, ParsedFeed};
use crate::reconcile::reconcile_entries;
use crate::traits::{FeedSource, FeedStore, FeedTransaction};
use crate::validator;

/// Orchestrates feed ingestion: fetch → validate → find-or-create → reconcile
/// entries → record health.
///
/// Generic over the feed source and the store via traits, enabling dependency
/// injection and testability without real HTTP or database access.
pub struct IngestService<F, S>
where
    F: FeedSource,
    S: FeedStore,
{
    source: F,
    store: S,
    health: HealthTracker,
    config: IngestConfig,
}

impl<F, S> IngestService<F, S>
where
    F: FeedSource,
    S: FeedStore,
{
    pub fn new(source: F, store: S, config: IngestConfig) -> Self {
        Self {
            source,
            store,
            health: HealthTracker::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a feed source.
    ///
    /// See [`Self::create_feed_at`].
    pub async fn create_feed(&self, feed_url: &str) -> Result<FeedCheckOutcome, AppError> {
        self.create_feed_at(feed_url, Utc::now()).await
    }

    /// Register a feed source, checking it at `now`.
    ///
    /// Invalid sources yield [`FeedCheckOutcome::Rejected`] and leave the store
    /// untouched. A valid source is matched to an existing feed by exact title
    /// and URL, or created; its entries are then reconciled. All writes happen
    /// in one transaction; a commit that loses a race on the feed URL is
    /// retried once against the stored row. `Err` is returned only for
    /// storage failures.
    pub async fn create_feed_at(
        &self,
        feed_url: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedCheckOutcome, AppError> {
        let rejected = |reason: AppError| -> Result<FeedCheckOutcome, AppError> {
            tracing::info!(%feed_url, %reason, "Feed source rejected");
            Ok(FeedCheckOutcome::Rejected {
                feed_url: feed_url.to_string(),
                reason,
            })
        };

        let url = match validator::validate_feed_url(feed_url) {
            Ok(url) => url,
            Err(reason) => return rejected(reason),
        };

        let fetched = match self.fetch(url.as_str()).await {
            Ok(fetched) => fetched,
            Err(reason) if reason.is_rejection() => return rejected(reason),
            Err(e) => return Err(e),
        };

        let document = match validator::check(&fetched) {
            Ok(document) => document,
            Err(reason) => return rejected(reason),
        };

        let (feed, entries_added) =
            match self.store_feed(feed_url, document, fetched.status, now).await {
                Err(AppError::PersistenceConflict(detail)) => {
                    // Another request stored this URL first; retry against its row.
                    tracing::debug!(%feed_url, %detail, "Feed insert lost a race, retrying");
                    self.store_feed(feed_url, document, fetched.status, now)
                        .await?
                }
                stored => stored?,
            };

        tracing::info!(feed_id = %feed.id, %feed_url, entries_added, "Feed created");
        Ok(FeedCheckOutcome::Created {
            feed,
            entries_added,
        })
    }

    /// Refresh every feed due at `now`.
    ///
    /// Feeds are processed concurrently, each in its own transaction. One
    /// feed's failure never aborts the batch; every selected feed yields
    /// exactly one outcome.
    pub async fn refresh_due_feeds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<FeedCheckOutcome>, AppError> {
        let mut due = self.store.select_feeds_due(now).await?;
        let mut seen = std::collections::HashSet::new();
        due.retain(|feed| seen.insert(feed.id));

        if due.is_empty() {
            tracing::debug!("No feeds due for refresh");
            return Ok(Vec::new());
        }
        tracing::info!(count = due.len(), "Refreshing due feeds");

        let outcomes = futures::stream::iter(due)
            .map(|feed| self.refresh_one(feed, now))
            .buffer_unordered(self.config.refresh_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    async fn refresh_one(&self, feed: Feed, now: DateTime<Utc>) -> FeedCheckOutcome {
        let feed_id = feed.id;
        match self.refresh_feed(feed_id, now).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                tracing::error!(%feed_id, error = %reason, "Feed refresh aborted");
                FeedCheckOutcome::Failed { feed, reason }
            }
        }
    }

    async fn refresh_feed(
        &self,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FeedCheckOutcome, AppError> {
        let mut tx = self.store.begin().await?;
        let Some(feed) = tx.lock_feed_if_due(feed_id, now).await? else {
            tracing::debug!(%feed_id, "Feed locked elsewhere or no longer due");
            return Ok(FeedCheckOutcome::Skipped { feed_id });
        };

        tracing::debug!(%feed_id, feed_url = %feed.feed_url, "Refreshing feed");
        let fetched = self.fetch(&feed.feed_url).await;
        let outcome = match fetched {
            Ok(fetched) => match validator::check(&fetched) {
                Ok(document) => {
                    let entries_added = reconcile_entries(&mut tx, &feed, &document.items).await?;
                    let mut feed = self.health.record_success(feed, now);
                    if let Some(updated) = document.updated_at {
                        feed.last_update = Some(updated);
                    }
                    let feed = tx.update_feed(&feed).await?;
                    FeedCheckOutcome::Refreshed {
                        feed,
                        entries_added,
                    }
                }
                Err(reason) => {
                    self.record_failure(&mut tx, feed, Some(fetched.status), reason, now)
                        .await?
                }
            },
            Err(reason) if reason.is_rejection() => {
                self.record_failure(&mut tx, feed, None, reason, now).await?
            }
            Err(e) => return Err(e),
        };
        tx.commit().await?;

        match &outcome {
            FeedCheckOutcome::Refreshed { entries_added, .. } => {
                tracing::info!(%feed_id, entries_added, "Feed refreshed");
            }
            FeedCheckOutcome::Failed { feed, reason } => {
                tracing::warn!(
                    %feed_id,
                    error = %reason,
                    errors = feed.number_of_errors,
                    active = feed.is_active,
                    "Feed refresh failed"
                );
            }
            _ => {}
        }
        Ok(outcome)
    }

    async fn record_failure(
        &self,
        tx: &mut S::Tx,
        feed: Feed,
        status: Option<u16>,
        reason: AppError,
        now: DateTime<Utc>,
    ) -> Result<FeedCheckOutcome, AppError> {
        let feed = self.health.record_failure(feed, status, now);
        let feed = tx.update_feed(&feed).await?;
        Ok(FeedCheckOutcome::Failed { feed, reason })
    }

    async fn fetch(&self, url: &str) -> Result<FetchResult, AppError> {
        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(duration_ms(timeout))),
        }
    }

    /// Find or insert the feed and reconcile its items in one transaction.
    async fn store_feed(
        &self,
        feed_url: &str,
        document: &ParsedFeed,
        status: u16,
        now: DateTime<Utc>,
    ) -> Result<(Feed, usize), AppError> {
        let mut tx = self.store.begin().await?;
        let feed = self
            .find_or_insert_feed(&mut tx, feed_url, document, status, now)
            .await?;
        let entries_added = reconcile_entries(&mut tx, &feed, &document.items).await?;
        tx.commit().await?;
        Ok((feed, entries_added))
    }

    /// Reuse the feed with the same title and URL, or insert a new one.
    ///
    /// Losing an insert race on the unique URL falls back to the row that won.
    async fn find_or_insert_feed(
        &self,
        tx: &mut S::Tx,
        feed_url: &str,
        document: &ParsedFeed,
        status: u16,
        now: DateTime<Utc>,
    ) -> Result<Feed, AppError> {
        if let Some(existing) = tx.find_feed_by(&document.title, feed_url).await? {
            tracing::debug!(feed_id = %existing.id, "Reusing existing feed");
            return Ok(existing);
        }

        let new_feed = NewFeed {
            title: document.title.clone(),
            feed_url: feed_url.to_string(),
            description: document.description.clone().unwrap_or_default(),
            last_update: document.updated_at,
            last_checked: now,
            next_check: self.health.next_check_after(now),
            last_status: Some(status),
        };

        match tx.insert_feed(&new_feed).await {
            Ok(feed) => Ok(feed),
            Err(AppError::PersistenceConflict(detail)) => {
                tracing::debug!(%feed_url, %detail, "Feed URL already registered");
                tx.find_feed_by_url(feed_url)
                    .await?
                    .ok_or(AppError::PersistenceConflict(detail))
            }
            Err(e) => Err(e),
        }
    }
}
