//! Test utilities: mock feed source, reporter and fixtures.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Feed, FetchResult, ParsedFeed, ParsedItem};
use crate::scheduler::{SchedulerEvent, SchedulerReporter};
use crate::traits::FeedSource;

// ---------------------------------------------------------------------------
// MockFeedSource
// ---------------------------------------------------------------------------

/// Mock feed source with a default response, per-URL overrides and an
/// optional queue of one-shot responses.
#[derive(Clone)]
pub struct MockFeedSource {
    default: Arc<Mutex<Result<FetchResult, AppError>>>,
    /// Consumed front to back before falling back to `default`.
    queued: Arc<Mutex<VecDeque<Result<FetchResult, AppError>>>>,
    by_url: Arc<Mutex<HashMap<String, Result<FetchResult, AppError>>>>,
    delay: Option<Duration>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFeedSource {
    /// Source that answers every request with `result`.
    pub fn new(result: FetchResult) -> Self {
        Self::from_default(Ok(result))
    }

    /// Source that fails every request with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self::from_default(Err(error))
    }

    /// Source that answers with `responses` in order, then fails.
    pub fn with_responses(responses: Vec<Result<FetchResult, AppError>>) -> Self {
        let source = Self::from_default(Err(AppError::FetchError(
            "no more mock responses".into(),
        )));
        *source.queued.lock().unwrap() = responses.into();
        source
    }

    /// Answer requests for `url` with `result` instead of the default.
    pub fn with_url_response(self, url: &str, result: Result<FetchResult, AppError>) -> Self {
        self.by_url.lock().unwrap().insert(url.to_string(), result);
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs requested so far, in call order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn from_default(default: Result<FetchResult, AppError>) -> Self {
        Self {
            default: Arc::new(Mutex::new(default)),
            queued: Arc::new(Mutex::new(VecDeque::new())),
            by_url: Arc::new(Mutex::new(HashMap::new())),
            delay: None,
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn respond(&self, url: &str) -> Result<FetchResult, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(result) = self.by_url.lock().unwrap().get(url) {
            return result.clone();
        }
        if let Some(result) = self.queued.lock().unwrap().pop_front() {
            return result;
        }
        self.default.lock().unwrap().clone()
    }
}

impl FeedSource for MockFeedSource {
    async fn fetch(&self, url: &str) -> Result<FetchResult, AppError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.respond(url)
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock scheduler reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulerReporter for MockReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        let label = match &event {
            SchedulerEvent::Started { .. } => "Started",
            SchedulerEvent::Polling => "Polling",
            SchedulerEvent::FeedRefreshed { .. } => "FeedRefreshed",
            SchedulerEvent::FeedFailed { .. } => "FeedFailed",
            SchedulerEvent::FeedSkipped { .. } => "FeedSkipped",
            SchedulerEvent::BatchCompleted { .. } => "BatchCompleted",
            SchedulerEvent::BatchFailed { .. } => "BatchFailed",
            SchedulerEvent::Stopped => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// The RSS 2.0 document parsed by [`sample_feed`].
pub const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0">
  <channel>
    <title>Sample Feed</title>
    <link>http://example.org/</link>
    <description>For documentation only</description>
    <lastBuildDate>Thu, 05 Sep 2002 00:00:01 GMT</lastBuildDate>
    <item>
      <title>First entry title</title>
      <link>http://example.org/entry/3</link>
      <description>Watch out for nasty tricks</description>
      <pubDate>Thu, 05 Sep 2002 00:00:01 GMT</pubDate>
      <guid>http://example.org/entry/3</guid>
    </item>
  </channel>
</rss>
"#;

/// Parsed form of [`SAMPLE_RSS`].
pub fn sample_feed() -> ParsedFeed {
    let published = Utc.with_ymd_and_hms(2002, 9, 5, 0, 0, 1).unwrap();
    ParsedFeed {
        title: "Sample Feed".to_string(),
        description: Some("For documentation only".to_string()),
        updated_at: Some(published),
        items: vec![ParsedItem {
            link: Some("http://example.org/entry/3".to_string()),
            id: Some("http://example.org/entry/3".to_string()),
            title: Some("First entry title".to_string()),
            content_or_summary: Some("Watch out for nasty tricks".to_string()),
            published_at: Some(published),
        }],
    }
}

/// A 200 `application/rss+xml` response carrying [`sample_feed`].
pub fn valid_fetch() -> FetchResult {
    FetchResult::ok(sample_feed())
}

/// A response with the given status and content type carrying [`sample_feed`].
pub fn status_fetch(status: u16, content_type: &str) -> FetchResult {
    FetchResult {
        status,
        content_type: Some(content_type.to_string()),
        document: Ok(sample_feed()),
    }
}

/// Create a healthy feed that is due now.
pub fn make_test_feed(feed_url: &str) -> Feed {
    let now = Utc::now();
    Feed {
        id: Uuid::new_v4(),
        title: "Sample Feed".to_string(),
        feed_url: feed_url.to_string(),
        description: "For documentation only".to_string(),
        last_update: None,
        last_checked: Some(now),
        next_check: Some(now),
        last_status: Some(200),
        number_of_errors: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
