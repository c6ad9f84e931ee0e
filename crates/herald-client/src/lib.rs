pub mod fetcher;
pub mod parser;

pub use fetcher::ReqwestFeedSource;
pub use parser::parse_feed;
