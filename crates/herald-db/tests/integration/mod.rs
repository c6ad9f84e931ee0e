pub mod common;

mod feed_store_tests;
mod ingest_tests;
