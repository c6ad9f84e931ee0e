pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod memory;
pub mod models;
pub mod reconcile;
pub mod scheduler;
pub mod timestamp;
pub mod traits;
pub mod validator;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::IngestConfig;
pub use error::AppError;
pub use health::HealthTracker;
pub use ingest::IngestService;
pub use memory::MemoryStore;
pub use models::{
    Entry, EntryKey, EntryProbe, Feed, FeedCheckOutcome, FetchResult, HealthState, NewEntry,
    NewFeed, ParsedFeed, ParsedItem, UNTITLED_FEED,
};
pub use scheduler::{BatchSummary, RefreshScheduler, SchedulerReporter, TracingSchedulerReporter};
pub use timestamp::parse_timestamp;
pub use traits::{FeedSource, FeedStore, FeedTransaction};
