use url::Url;

use crate::domain::{FeedSummary, UnreadEntry};
use crate::errors::{PithyError, PithyResult};
use crate::storage::traits::{SubscriptionRepository, UnreadItemRepository};

pub struct SubscriptionService<R: SubscriptionRepository> {
    repository: R,
}

impl<R: SubscriptionRepository> SubscriptionService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Add a new user
    pub fn add_user(&self, name: &str) -> PithyResult<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PithyError::InvalidInput("user name cannot be empty".to_string()));
        }
        self.repository.create_user(name)
    }

    /// Resolve a user name to its id
    pub fn user_id(&self, name: &str) -> PithyResult<i64> {
        self.repository
            .get_user_id_by_name(name)?
            .ok_or_else(|| PithyError::UserNotFound(name.to_string()))
    }

    /// Subscribe a user to a feed URL, creating the feed on first use.
    /// Returns the feed id.
    pub fn subscribe(&self, user_id: i64, url: &str) -> PithyResult<i64> {
        let url = normalize_feed_url(url)?;
        self.repository.create_subscription(user_id, &url)
    }

    pub fn unsubscribe(&self, user_id: i64, feed_id: i64) -> PithyResult<()> {
        self.repository.delete_subscription(user_id, feed_id)
    }

    pub fn list(&self, user_id: i64) -> PithyResult<Vec<FeedSummary>> {
        self.repository.get_subscriptions(user_id)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MarkReadSummary {
    pub marked: usize,
    pub skipped: Vec<i64>,
}

pub struct UnreadService<R: UnreadItemRepository> {
    repository: R,
}

impl<R: UnreadItemRepository> UnreadService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn list(&self, user_id: i64) -> PithyResult<Vec<UnreadEntry>> {
        self.repository.get_unread_items(user_id)
    }

    /// Mark the given items read. Ids that are not unread for this user are
    /// skipped and reported back; any other error aborts.
    pub fn mark_read(&self, user_id: i64, item_ids: &[i64]) -> PithyResult<MarkReadSummary> {
        let mut summary = MarkReadSummary::default();
        for &item_id in item_ids {
            match self.repository.mark_item_read(user_id, item_id) {
                Ok(()) => summary.marked += 1,
                Err(PithyError::ItemNotFound(_)) => summary.skipped.push(item_id),
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    pub fn mark_all_read(&self, user_id: i64) -> PithyResult<usize> {
        self.repository.mark_all_items_read(user_id)
    }
}

/// Feeds are identified by an absolute http(s) URL.
fn normalize_feed_url(raw: &str) -> PithyResult<String> {
    let url = Url::parse(raw.trim()).map_err(|e| PithyError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(PithyError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                scheme, raw
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(PithyError::InvalidUrl(format!("missing host in {}", raw)));
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParsedFeed, ParsedItem};
    use crate::storage::sqlite::{
        SqliteFeedRepository, SqliteStorage, SqliteSubscriptionRepository,
        SqliteUnreadItemRepository,
    };
    use crate::storage::traits::{FeedStateRepository, MockUnreadItemRepository};
    use chrono::Utc;

    fn setup() -> SubscriptionService<SqliteSubscriptionRepository> {
        let storage = SqliteStorage::in_memory().unwrap();
        SubscriptionService::new(SqliteSubscriptionRepository::new(storage))
    }

    #[test]
    fn test_add_user_and_lookup() {
        let service = setup();
        let id = service.add_user("  alice ").unwrap();
        assert_eq!(service.user_id("alice").unwrap(), id);
        assert!(matches!(
            service.user_id("bob"),
            Err(PithyError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_empty_user_name_rejected() {
        let service = setup();
        assert!(matches!(
            service.add_user("   "),
            Err(PithyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_subscribe_validates_url() {
        let service = setup();
        let alice = service.add_user("alice").unwrap();

        assert!(matches!(
            service.subscribe(alice, "not a url"),
            Err(PithyError::InvalidUrl(_))
        ));
        assert!(matches!(
            service.subscribe(alice, "ftp://example.com/feed"),
            Err(PithyError::InvalidUrl(_))
        ));

        let feed_id = service.subscribe(alice, "https://example.com/feed").unwrap();
        let feeds = service.list(alice).unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_id, feed_id);
        assert!(feeds[0].last_fetch_time.is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let service = setup();
        let alice = service.add_user("alice").unwrap();
        let feed_id = service.subscribe(alice, "https://example.com/feed").unwrap();

        service.unsubscribe(alice, feed_id).unwrap();
        assert!(service.list(alice).unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_skips_unknown_items() {
        let storage = SqliteStorage::in_memory().unwrap();
        let subscriptions = SqliteSubscriptionRepository::new(storage.clone());
        let feeds = SqliteFeedRepository::new(storage.clone());
        let service = UnreadService::new(SqliteUnreadItemRepository::new(storage));

        let alice = subscriptions.create_user("alice").unwrap();
        let feed_id = subscriptions
            .create_subscription(alice, "https://example.com/feed")
            .unwrap();
        let parsed = ParsedFeed::new(vec![
            ParsedItem::new("One", "https://example.com/1"),
            ParsedItem::new("Two", "https://example.com/2"),
        ]);
        feeds
            .update_feed_with_fetch_success(feed_id, &parsed, None, Utc::now())
            .unwrap();
        let ids: Vec<i64> = service.list(alice).unwrap().iter().map(|e| e.item_id).collect();

        let summary = service.mark_read(alice, &[ids[0], 999, ids[1]]).unwrap();

        assert_eq!(
            summary,
            MarkReadSummary {
                marked: 2,
                skipped: vec![999],
            }
        );
        assert!(service.list(alice).unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_aborts_on_storage_error() {
        let mut repo = MockUnreadItemRepository::new();
        repo.expect_mark_item_read()
            .times(1)
            .returning(|_, _| Err(PithyError::StorageUnavailable("locked".to_string())));

        let service = UnreadService::new(repo);
        let result = service.mark_read(1, &[1, 2]);

        assert!(matches!(result, Err(PithyError::StorageUnavailable(_))));
    }

    #[test]
    fn test_unread_service_lists_empty() {
        let storage = SqliteStorage::in_memory().unwrap();
        let service = UnreadService::new(SqliteUnreadItemRepository::new(storage));
        assert!(service.list(1).unwrap().is_empty());
        assert_eq!(service.mark_all_read(1).unwrap(), 0);
    }
}
