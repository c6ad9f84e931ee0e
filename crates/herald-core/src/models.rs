use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Title stored when a feed document carries none.
pub const UNTITLED_FEED: &str = "Untitled Feed";

/// A subscribed feed source and its health bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub title: String,
    /// Unique across all feeds.
    pub feed_url: String,
    pub description: String,
    /// Last-modified timestamp declared by the feed document itself.
    pub last_update: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    /// HTTP status of the most recent fetch, `None` when no response arrived.
    pub last_status: Option<u16>,
    pub number_of_errors: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    /// Derive the health state under the given error limit.
    ///
    /// An active feed whose last check succeeded is healthy even when earlier
    /// failures are still counted.
    pub fn health_state(&self, error_limit: u32) -> HealthState {
        if !self.is_active || self.number_of_errors > error_limit {
            HealthState::Deactivated
        } else if self.number_of_errors == 0 || self.last_status == Some(200) {
            HealthState::Healthy
        } else {
            HealthState::Degraded {
                errors: self.number_of_errors,
            }
        }
    }
}

/// DTO for inserting a new feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFeed {
    pub title: String,
    pub feed_url: String,
    pub description: String,
    pub last_update: Option<DateTime<Utc>>,
    pub last_checked: DateTime<Utc>,
    pub next_check: DateTime<Utc>,
    pub last_status: Option<u16>,
}

/// A single item stored under a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: Option<String>,
    pub url: Option<String>,
    pub guid: Option<String>,
    pub content: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// DTO for inserting a new entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    pub feed_id: Uuid,
    pub title: Option<String>,
    pub url: Option<String>,
    pub guid: Option<String>,
    pub content: String,
    pub publish_date: Option<DateTime<Utc>>,
}

/// A feed document as produced by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: String,
    pub description: Option<String>,
    /// Feed-level update timestamp (falls back to the published date).
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<ParsedItem>,
}

/// One item of a parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub link: Option<String>,
    /// The item's guid or Atom id, only when the document declares one.
    pub id: Option<String>,
    pub title: Option<String>,
    /// Full content when present, otherwise the summary/description.
    pub content_or_summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of fetching a feed source.
///
/// A response always carries its status and content type. The body is parsed
/// eagerly; `document` holds the parse error text when the body is malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub status: u16,
    pub content_type: Option<String>,
    pub document: Result<ParsedFeed, String>,
}

impl FetchResult {
    /// A 200 response with an XML content type and the given document.
    pub fn ok(document: ParsedFeed) -> Self {
        Self {
            status: 200,
            content_type: Some("application/rss+xml".to_string()),
            document: Ok(document),
        }
    }
}

/// Field used to identify a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Url,
    Guid,
    Title,
}

impl EntryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKey::Url => "url",
            EntryKey::Guid => "guid",
            EntryKey::Title => "title",
        }
    }
}

/// Identity probe for an incoming item: the non-empty identifying fields,
/// all of which must match for an entry to count as already stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EntryProbe {
    fields: Vec<(EntryKey, String)>,
}

impl EntryProbe {
    /// Build a probe from an item's link, id and title, skipping empty values.
    pub fn from_item(item: &ParsedItem) -> Self {
        let fields = [
            (EntryKey::Url, item.link.as_deref()),
            (EntryKey::Guid, item.id.as_deref()),
            (EntryKey::Title, item.title.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value {
            Some(v) if !v.is_empty() => Some((key, v.to_string())),
            _ => None,
        })
        .collect();

        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(EntryKey, String)] {
        &self.fields
    }

    pub fn get(&self, key: EntryKey) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when every probe field equals the corresponding entry field.
    /// An empty probe matches nothing.
    pub fn matches(&self, entry: &Entry) -> bool {
        !self.fields.is_empty()
            && self.fields.iter().all(|(key, value)| {
                let stored = match key {
                    EntryKey::Url => entry.url.as_deref(),
                    EntryKey::Guid => entry.guid.as_deref(),
                    EntryKey::Title => entry.title.as_deref(),
                };
                stored == Some(value.as_str())
            })
    }
}

/// Derived health of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded { errors: u32 },
    Deactivated,
}

/// Outcome of one create or refresh attempt.
#[derive(Debug, Clone)]
pub enum FeedCheckOutcome {
    /// A feed was accepted on creation (or an existing record was reused).
    Created { feed: Feed, entries_added: usize },
    /// A scheduled refresh succeeded.
    Refreshed { feed: Feed, entries_added: usize },
    /// The source was rejected on creation. Nothing was persisted.
    Rejected { feed_url: String, reason: AppError },
    /// A scheduled refresh failed. `feed` reflects the recorded failure
    /// when it could be persisted.
    Failed { feed: Feed, reason: AppError },
    /// Another worker holds the feed or it is no longer due.
    Skipped { feed_id: Uuid },
}

impl FeedCheckOutcome {
    pub fn feed(&self) -> Option<&Feed> {
        match self {
            FeedCheckOutcome::Created { feed, .. }
            | FeedCheckOutcome::Refreshed { feed, .. }
            | FeedCheckOutcome::Failed { feed, .. } => Some(feed),
            FeedCheckOutcome::Rejected { .. } | FeedCheckOutcome::Skipped { .. } => None,
        }
    }

    pub fn entries_added(&self) -> usize {
        match self {
            FeedCheckOutcome::Created { entries_added, .. }
            | FeedCheckOutcome::Refreshed { entries_added, .. } => *entries_added,
            _ => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FeedCheckOutcome::Created { .. } | FeedCheckOutcome::Refreshed { .. }
        )
    }
}
