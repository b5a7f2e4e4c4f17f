pub mod feed;
pub mod item;
pub mod outcome;

pub use feed::{Feed, FeedSummary, StaleFeedCandidate};
pub use item::{IngestSummary, Item, ParsedFeed, ParsedItem, UnreadEntry};
pub use outcome::{FetchOutcome, RefreshReport, RefreshStatus};
