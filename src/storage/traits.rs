use chrono::{DateTime, Utc};

use crate::domain::{Feed, FeedSummary, IngestSummary, Item, ParsedFeed, StaleFeedCandidate, UnreadEntry};
use crate::errors::PithyResult;

/// Feed-state contract the refresh engine depends on.
///
/// Every update must move the feed's `last_fetch_time` strictly forward, and
/// `update_feed_with_fetch_success` must apply item insertion, subscriber
/// fan-out and the metadata update as a single unit.
#[cfg_attr(test, mockall::automock)]
pub trait FeedStateRepository: Send + Sync {
    fn get_feeds_unchecked_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> PithyResult<Vec<StaleFeedCandidate>>;

    fn update_feed_with_fetch_success(
        &self,
        feed_id: i64,
        parsed_feed: &ParsedFeed,
        etag: Option<String>,
        fetch_time: DateTime<Utc>,
    ) -> PithyResult<IngestSummary>;

    fn update_feed_with_fetch_unchanged(
        &self,
        feed_id: i64,
        fetch_time: DateTime<Utc>,
    ) -> PithyResult<()>;

    fn update_feed_with_fetch_failure(
        &self,
        feed_id: i64,
        reason: &str,
        fetch_time: DateTime<Utc>,
    ) -> PithyResult<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait FeedRepository: Send + Sync {
    fn get_feed(&self, feed_id: i64) -> PithyResult<Option<Feed>>;
    fn get_items_for_feed(&self, feed_id: i64) -> PithyResult<Vec<Item>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait SubscriptionRepository: Send + Sync {
    fn create_user(&self, name: &str) -> PithyResult<i64>;
    fn get_user_id_by_name(&self, name: &str) -> PithyResult<Option<i64>>;
    /// Subscribes the user, creating the feed row on first use. Returns the feed id.
    fn create_subscription(&self, user_id: i64, feed_url: &str) -> PithyResult<i64>;
    fn delete_subscription(&self, user_id: i64, feed_id: i64) -> PithyResult<()>;
    fn get_subscriptions(&self, user_id: i64) -> PithyResult<Vec<FeedSummary>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait UnreadItemRepository: Send + Sync {
    fn get_unread_items(&self, user_id: i64) -> PithyResult<Vec<UnreadEntry>>;
    fn mark_item_read(&self, user_id: i64, item_id: i64) -> PithyResult<()>;
    fn mark_all_items_read(&self, user_id: i64) -> PithyResult<usize>;
}
