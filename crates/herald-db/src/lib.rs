pub mod config;
pub mod database;
pub mod feed_store;

pub use config::DatabaseConfig;
pub use database::Database;
pub use feed_store::{PgFeedStore, PgFeedTransaction};
