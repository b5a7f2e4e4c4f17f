pub mod fetcher;
pub mod parser;

pub use fetcher::{FetchResponse, HttpFetcher, MAX_FEED_SIZE};
pub use parser::parse_feed;
