use rusqlite::{params, OptionalExtension};

use crate::domain::FeedSummary;
use crate::errors::{PithyError, PithyResult};
use crate::storage::sqlite::connection::from_micros;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::SubscriptionRepository;

pub struct SqliteSubscriptionRepository {
    storage: SqliteStorage,
}

impl SqliteSubscriptionRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    fn create_user(&self, name: &str) -> PithyResult<i64> {
        let conn = self.storage.connection()?;

        // Check if already exists (within the same connection to avoid deadlock)
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(PithyError::UserAlreadyExists(name.to_string()));
        }

        conn.execute("INSERT INTO users (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
    }

    fn get_user_id_by_name(&self, name: &str) -> PithyResult<Option<i64>> {
        let conn = self.storage.connection()?;
        conn.query_row("SELECT id FROM users WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()
        .map_err(PithyError::from)
    }

    fn create_subscription(&self, user_id: i64, feed_url: &str) -> PithyResult<i64> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;

        let user_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            [user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(PithyError::UserNotFound(user_id.to_string()));
        }

        tx.execute("INSERT OR IGNORE INTO feeds (url) VALUES (?1)", [feed_url])?;
        let feed_id: i64 =
            tx.query_row("SELECT id FROM feeds WHERE url = ?1", [feed_url], |row| {
                row.get(0)
            })?;
        tx.execute(
            "INSERT OR IGNORE INTO subscriptions (user_id, feed_id) VALUES (?1, ?2)",
            params![user_id, feed_id],
        )?;

        tx.commit()?;
        Ok(feed_id)
    }

    fn delete_subscription(&self, user_id: i64, feed_id: i64) -> PithyResult<()> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM unread_items
             WHERE user_id = ?1 AND item_id IN (SELECT id FROM items WHERE feed_id = ?2)",
            params![user_id, feed_id],
        )?;
        let removed = tx.execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND feed_id = ?2",
            params![user_id, feed_id],
        )?;
        if removed == 0 {
            return Err(PithyError::FeedNotFound(feed_id));
        }

        tx.commit()?;
        Ok(())
    }

    fn get_subscriptions(&self, user_id: i64) -> PithyResult<Vec<FeedSummary>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(
            "SELECT feeds.id, feeds.name, feeds.url, feeds.last_fetch_time, feeds.last_failure
             FROM feeds
               JOIN subscriptions ON feeds.id = subscriptions.feed_id
             WHERE subscriptions.user_id = ?1
             ORDER BY COALESCE(feeds.name, feeds.url)",
        )?;

        let feeds = stmt.query_map([user_id], |row| {
            let last_fetch_time: Option<i64> = row.get(3)?;
            Ok(FeedSummary {
                feed_id: row.get(0)?,
                name: row.get(1)?,
                url: row.get(2)?,
                last_fetch_time: last_fetch_time.map(from_micros),
                last_failure: row.get(4)?,
            })
        })?;

        feeds.collect::<Result<Vec<_>, _>>().map_err(PithyError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParsedFeed, ParsedItem};
    use crate::storage::sqlite::{SqliteFeedRepository, SqliteUnreadItemRepository};
    use crate::storage::traits::{FeedStateRepository, UnreadItemRepository};
    use chrono::Utc;

    fn setup() -> (SqliteStorage, SqliteSubscriptionRepository) {
        let storage = SqliteStorage::in_memory().unwrap();
        let repo = SqliteSubscriptionRepository::new(storage.clone());
        (storage, repo)
    }

    #[test]
    fn test_create_and_find_user() {
        let (_, repo) = setup();
        let id = repo.create_user("alice").unwrap();
        assert!(id > 0);
        assert_eq!(repo.get_user_id_by_name("alice").unwrap(), Some(id));
        assert_eq!(repo.get_user_id_by_name("nobody").unwrap(), None);
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let (_, repo) = setup();
        repo.create_user("alice").unwrap();
        let result = repo.create_user("alice");
        assert!(matches!(result, Err(PithyError::UserAlreadyExists(_))));
    }

    #[test]
    fn test_subscribers_share_one_feed_row() {
        let (_, repo) = setup();
        let alice = repo.create_user("alice").unwrap();
        let bob = repo.create_user("bob").unwrap();

        let a = repo.create_subscription(alice, "https://example.com/feed").unwrap();
        let b = repo.create_subscription(bob, "https://example.com/feed").unwrap();
        assert_eq!(a, b);

        // Subscribing twice is a no-op
        let again = repo.create_subscription(alice, "https://example.com/feed").unwrap();
        assert_eq!(again, a);
        assert_eq!(repo.get_subscriptions(alice).unwrap().len(), 1);
    }

    #[test]
    fn test_subscribe_unknown_user_fails() {
        let (_, repo) = setup();
        let result = repo.create_subscription(99, "https://example.com/feed");
        assert!(matches!(result, Err(PithyError::UserNotFound(_))));
    }

    #[test]
    fn test_unsubscribe_drops_unread_markers_for_that_feed() {
        let (storage, repo) = setup();
        let feeds = SqliteFeedRepository::new(storage.clone());
        let unread = SqliteUnreadItemRepository::new(storage);

        let alice = repo.create_user("alice").unwrap();
        let kept = repo.create_subscription(alice, "https://a.example/feed").unwrap();
        let dropped = repo.create_subscription(alice, "https://b.example/feed").unwrap();

        for feed_id in [kept, dropped] {
            let parsed = ParsedFeed::new(vec![ParsedItem::new(
                "Post",
                format!("https://example.com/{}", feed_id),
            )]);
            feeds
                .update_feed_with_fetch_success(feed_id, &parsed, None, Utc::now())
                .unwrap();
        }
        assert_eq!(unread.get_unread_items(alice).unwrap().len(), 2);

        repo.delete_subscription(alice, dropped).unwrap();

        let remaining = unread.get_unread_items(alice).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].feed_id, kept);
        assert_eq!(repo.get_subscriptions(alice).unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_feed_fails() {
        let (_, repo) = setup();
        let alice = repo.create_user("alice").unwrap();
        let result = repo.delete_subscription(alice, 7);
        assert!(matches!(result, Err(PithyError::FeedNotFound(7))));
    }
}
