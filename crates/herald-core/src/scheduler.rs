use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::IngestService;
use crate::models::FeedCheckOutcome;
use crate::traits::{FeedSource, FeedStore};

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    Started {
        tick_secs: u64,
    },
    Polling,
    FeedRefreshed {
        feed_id: Uuid,
        entries_added: usize,
    },
    FeedFailed {
        feed_id: Uuid,
        error: &'a str,
        deactivated: bool,
    },
    FeedSkipped {
        feed_id: Uuid,
    },
    BatchCompleted {
        refreshed: usize,
        failed: usize,
        skipped: usize,
    },
    BatchFailed {
        error: &'a str,
    },
    Stopped,
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait SchedulerReporter: Send + Sync {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSchedulerReporter;

impl SchedulerReporter for TracingSchedulerReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::Started { tick_secs } => {
                tracing::info!(%tick_secs, "Refresh scheduler started");
            }
            SchedulerEvent::Polling => {
                tracing::debug!("Polling for due feeds");
            }
            SchedulerEvent::FeedRefreshed {
                feed_id,
                entries_added,
            } => {
                tracing::debug!(%feed_id, %entries_added, "Feed refreshed");
            }
            SchedulerEvent::FeedFailed {
                feed_id,
                error,
                deactivated,
            } => {
                tracing::warn!(%feed_id, %error, %deactivated, "Feed check failed");
            }
            SchedulerEvent::FeedSkipped { feed_id } => {
                tracing::debug!(%feed_id, "Feed skipped");
            }
            SchedulerEvent::BatchCompleted {
                refreshed,
                failed,
                skipped,
            } => {
                tracing::info!(%refreshed, %failed, %skipped, "Refresh batch completed");
            }
            SchedulerEvent::BatchFailed { error } => {
                tracing::error!(%error, "Failed to select due feeds");
            }
            SchedulerEvent::Stopped => {
                tracing::info!("Refresh scheduler stopped");
            }
        }
    }
}

/// Counts of one refresh batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub refreshed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Periodically refreshes due feeds until cancelled.
pub struct RefreshScheduler<F, S>
where
    F: FeedSource,
    S: FeedStore,
{
    service: Arc<IngestService<F, S>>,
}

impl<F, S> RefreshScheduler<F, S>
where
    F: FeedSource,
    S: FeedStore,
{
    pub fn new(service: Arc<IngestService<F, S>>) -> Self {
        Self { service }
    }

    /// Run the scheduler loop until cancellation.
    ///
    /// A batch that is already running finishes before the loop exits.
    pub async fn run<R: SchedulerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<(), AppError> {
        let tick = self.service.config().scheduler_tick;
        reporter.report(SchedulerEvent::Started {
            tick_secs: tick.as_secs(),
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            reporter.report(SchedulerEvent::Polling);
            let _ = self.run_once(Utc::now(), reporter).await;

            tokio::select! {
                () = tokio::time::sleep(tick) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(SchedulerEvent::Stopped);
        Ok(())
    }

    /// Refresh every feed due at `now` once and report per-feed results.
    pub async fn run_once<R: SchedulerReporter>(
        &self,
        now: DateTime<Utc>,
        reporter: &R,
    ) -> Result<BatchSummary, AppError> {
        let outcomes = match self.service.refresh_due_feeds(now).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                let error_msg = e.to_string();
                reporter.report(SchedulerEvent::BatchFailed { error: &error_msg });
                return Err(e);
            }
        };

        let mut summary = BatchSummary::default();
        for outcome in &outcomes {
            match outcome {
                FeedCheckOutcome::Refreshed {
                    feed,
                    entries_added,
                }
                | FeedCheckOutcome::Created {
                    feed,
                    entries_added,
                } => {
                    summary.refreshed += 1;
                    reporter.report(SchedulerEvent::FeedRefreshed {
                        feed_id: feed.id,
                        entries_added: *entries_added,
                    });
                }
                FeedCheckOutcome::Failed { feed, reason } => {
                    summary.failed += 1;
                    let error_msg = reason.to_string();
                    reporter.report(SchedulerEvent::FeedFailed {
                        feed_id: feed.id,
                        error: &error_msg,
                        deactivated: !feed.is_active,
                    });
                }
                FeedCheckOutcome::Skipped { feed_id } => {
                    summary.skipped += 1;
                    reporter.report(SchedulerEvent::FeedSkipped { feed_id: *feed_id });
                }
                FeedCheckOutcome::Rejected { feed_url, reason } => {
                    summary.failed += 1;
                    tracing::warn!(%feed_url, %reason, "Unexpected rejection during refresh");
                }
            }
        }

        reporter.report(SchedulerEvent::BatchCompleted {
            refreshed: summary.refreshed,
            failed: summary.failed,
            skipped: summary.skipped,
        });
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;

    use super::*;
    use crate::config::IngestConfig;
    use crate::memory::MemoryStore;
    use crate::testutil::*;

    fn scheduler_with(
        source: MockFeedSource,
        store: MemoryStore,
    ) -> RefreshScheduler<MockFeedSource, MemoryStore> {
        let config = IngestConfig::default().with_scheduler_tick(Duration::from_millis(10));
        RefreshScheduler::new(Arc::new(IngestService::new(source, store, config)))
    }

    #[tokio::test]
    async fn run_once_reports_each_outcome() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for url in ["http://ok.example/rss", "http://down.example/rss"] {
            let mut feed = make_test_feed(url);
            feed.next_check = Some(now - TimeDelta::minutes(1));
            store.seed_feed(feed).await;
        }
        let source = MockFeedSource::new(valid_fetch())
            .with_url_response("http://down.example/rss", Ok(status_fetch(503, "text/html")));
        let scheduler = scheduler_with(source, store);
        let reporter = MockReporter::new();

        let summary = scheduler.run_once(now, &reporter).await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                refreshed: 1,
                failed: 1,
                skipped: 0
            }
        );
        let events = reporter.events.lock().unwrap();
        assert!(events.contains(&"FeedRefreshed".to_string()));
        assert!(events.contains(&"FeedFailed".to_string()));
        assert_eq!(events.last().unwrap(), "BatchCompleted");
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let scheduler = scheduler_with(MockFeedSource::new(valid_fetch()), MemoryStore::new());
        let reporter = MockReporter::new();
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        scheduler.run(cancel, &reporter).await.unwrap();

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.first().unwrap(), "Started");
        assert!(events.contains(&"Polling".to_string()));
        assert_eq!(events.last().unwrap(), "Stopped");
    }

    #[tokio::test]
    async fn run_exits_immediately_when_already_cancelled() {
        let scheduler = scheduler_with(MockFeedSource::new(valid_fetch()), MemoryStore::new());
        let reporter = MockReporter::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler.run(cancel, &reporter).await.unwrap();

        let events = reporter.events.lock().unwrap();
        assert_eq!(*events, vec!["Started".to_string(), "Stopped".to_string()]);
    }

    #[tokio::test]
    async fn scheduled_refresh_advances_next_check() {
        let store = MemoryStore::new();
        let mut feed = make_test_feed("http://example.org/rss");
        feed.next_check = Some(Utc::now() - TimeDelta::minutes(1));
        let feed = store.seed_feed(feed).await;
        let scheduler = scheduler_with(MockFeedSource::new(valid_fetch()), store.clone());
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        scheduler.run(cancel, &MockReporter::new()).await.unwrap();

        let stored = store.feed(feed.id).await.unwrap();
        assert!(stored.next_check.unwrap() > Utc::now() + TimeDelta::minutes(50));
        assert_eq!(store.entries_for(feed.id).await.len(), 1);
    }
}
