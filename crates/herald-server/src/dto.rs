use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_core::models::Feed;

pub const FEED_CREATED: &str = "RSS Feed successfully was created";
pub const FEED_INVALID: &str = "RSS Feed URL is invalid";

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateFeedRequest {
    /// RSS or Atom document URL
    pub feed_url: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateFeedResponse {
    pub feed_url: String,
    pub message: String,
    /// The registered feed; `null` when the source was rejected
    pub rss_feed: Option<FeedResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FeedResponse {
    pub id: Uuid,
    pub title: String,
    pub feed_url: String,
    pub description: String,
    pub last_update: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    pub last_status: Option<u16>,
    pub number_of_errors: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Feed> for FeedResponse {
    fn from(feed: Feed) -> Self {
        Self {
            id: feed.id,
            title: feed.title,
            feed_url: feed.feed_url,
            description: feed.description,
            last_update: feed.last_update,
            last_checked: feed.last_checked,
            next_check: feed.next_check,
            last_status: feed.last_status,
            number_of_errors: feed.number_of_errors,
            is_active: feed.is_active,
            created_at: feed.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
