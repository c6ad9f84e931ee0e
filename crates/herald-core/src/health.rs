//! Per-feed check bookkeeping: error counting, deactivation and the next
//! check time.

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::IngestConfig;
use crate::models::Feed;

/// Applies check results to a feed record.
///
/// The error counter only grows. A feed is deactivated once the counter
/// exceeds the limit and is never reactivated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTracker {
    error_limit: u32,
    check_interval: TimeDelta,
}

impl HealthTracker {
    pub fn new(error_limit: u32, check_interval: TimeDelta) -> Self {
        Self {
            error_limit,
            check_interval,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        let check_interval =
            TimeDelta::from_std(config.check_interval).unwrap_or(TimeDelta::hours(1));
        Self::new(config.error_limit, check_interval)
    }

    pub fn error_limit(&self) -> u32 {
        self.error_limit
    }

    /// When a feed checked at `at` is next due.
    pub fn next_check_after(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at + self.check_interval
    }

    /// Record a successful fetch of a valid document.
    pub fn record_success(&self, mut feed: Feed, at: DateTime<Utc>) -> Feed {
        feed.last_status = Some(200);
        feed.last_checked = Some(at);
        feed.next_check = Some(self.next_check_after(at));
        feed
    }

    /// Record a failed check. `status` is the HTTP status when a response
    /// arrived at all.
    pub fn record_failure(&self, mut feed: Feed, status: Option<u16>, at: DateTime<Utc>) -> Feed {
        feed.number_of_errors = feed.number_of_errors.saturating_add(1);
        if feed.number_of_errors > self.error_limit && feed.is_active {
            tracing::warn!(
                feed_id = %feed.id,
                feed_url = %feed.feed_url,
                errors = feed.number_of_errors,
                limit = self.error_limit,
                "Feed deactivated after repeated errors"
            );
            feed.is_active = false;
        }
        feed.last_status = status;
        feed.last_checked = Some(at);
        feed.next_check = Some(self.next_check_after(at));
        feed
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}
