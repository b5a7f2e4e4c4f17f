pub mod traits;
pub mod sqlite;

pub use traits::{FeedRepository, FeedStateRepository, SubscriptionRepository, UnreadItemRepository};
pub use sqlite::{
    SqliteFeedRepository, SqliteStorage, SqliteSubscriptionRepository, SqliteUnreadItemRepository,
};
