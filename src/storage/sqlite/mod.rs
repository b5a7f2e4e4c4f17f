mod connection;
mod feed_repository;
mod subscription_repository;
mod unread_item_repository;

pub use connection::SqliteStorage;
pub use feed_repository::SqliteFeedRepository;
pub use subscription_repository::SqliteSubscriptionRepository;
pub use unread_item_repository::SqliteUnreadItemRepository;
