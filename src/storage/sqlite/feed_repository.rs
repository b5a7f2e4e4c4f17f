use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{Feed, IngestSummary, Item, ParsedFeed, StaleFeedCandidate};
use crate::errors::{PithyError, PithyResult};
use crate::storage::sqlite::connection::{from_micros, to_micros};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{FeedRepository, FeedStateRepository};

// Moves last_fetch_time to ?2, or one microsecond past its current value when
// ?2 is not newer, so every recorded attempt advances it.
const ADVANCE_FETCH_TIME: &str = "last_fetch_time = CASE \
     WHEN last_fetch_time IS NULL OR last_fetch_time < ?2 THEN ?2 \
     ELSE last_fetch_time + 1 END";

pub struct SqliteFeedRepository {
    storage: SqliteStorage,
}

impl SqliteFeedRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

fn row_to_feed(row: &Row<'_>) -> rusqlite::Result<Feed> {
    let last_fetch_time: Option<i64> = row.get(4)?;
    let last_failure_time: Option<i64> = row.get(6)?;

    Ok(Feed {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        etag: row.get(3)?,
        last_fetch_time: last_fetch_time.map(from_micros),
        last_failure: row.get(5)?,
        last_failure_time: last_failure_time.map(from_micros),
    })
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    let publication_time: Option<i64> = row.get(4)?;
    let creation_time: i64 = row.get(5)?;

    Ok(Item {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        publication_time: publication_time.map(from_micros),
        creation_time: from_micros(creation_time),
    })
}

fn ensure_updated(changed: usize, feed_id: i64) -> PithyResult<()> {
    if changed == 0 {
        return Err(PithyError::FeedNotFound(feed_id));
    }
    Ok(())
}

impl FeedStateRepository for SqliteFeedRepository {
    fn get_feeds_unchecked_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> PithyResult<Vec<StaleFeedCandidate>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, url, etag FROM feeds
             WHERE (last_fetch_time IS NULL OR last_fetch_time < ?1)
               AND EXISTS (SELECT 1 FROM subscriptions WHERE subscriptions.feed_id = feeds.id)
             ORDER BY last_fetch_time IS NOT NULL, last_fetch_time",
        )?;

        let candidates = stmt.query_map([to_micros(threshold)], |row| {
            Ok(StaleFeedCandidate {
                feed_id: row.get(0)?,
                url: row.get(1)?,
                etag: row.get(2)?,
            })
        })?;

        candidates
            .collect::<Result<Vec<_>, _>>()
            .map_err(PithyError::from)
    }

    fn update_feed_with_fetch_success(
        &self,
        feed_id: i64,
        parsed_feed: &ParsedFeed,
        etag: Option<String>,
        fetch_time: DateTime<Utc>,
    ) -> PithyResult<IngestSummary> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM feeds WHERE id = ?1)",
            [feed_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(PithyError::FeedNotFound(feed_id));
        }

        let mut summary = IngestSummary::default();

        {
            let mut insert_item = tx.prepare(
                "INSERT OR IGNORE INTO items (feed_id, url, title, publication_time, creation_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut fan_out = tx.prepare(
                "INSERT OR IGNORE INTO unread_items (user_id, item_id)
                 SELECT user_id, ?2 FROM subscriptions WHERE feed_id = ?1",
            )?;

            for item in &parsed_feed.items {
                let inserted = insert_item.execute(params![
                    feed_id,
                    item.url,
                    item.title,
                    item.publication_time.map(to_micros),
                    to_micros(fetch_time),
                ])?;
                if inserted == 0 {
                    continue;
                }

                let item_id = tx.last_insert_rowid();
                summary.new_items += 1;
                summary.unread_created += fan_out.execute(params![feed_id, item_id])?;
            }
        }

        let changed = tx.execute(
            &format!(
                "UPDATE feeds SET name = COALESCE(?3, name), etag = ?4,
                     last_failure = NULL, last_failure_time = NULL, {}
                 WHERE id = ?1",
                ADVANCE_FETCH_TIME
            ),
            params![feed_id, to_micros(fetch_time), parsed_feed.title, etag],
        )?;
        ensure_updated(changed, feed_id)?;

        tx.commit()?;
        Ok(summary)
    }

    fn update_feed_with_fetch_unchanged(
        &self,
        feed_id: i64,
        fetch_time: DateTime<Utc>,
    ) -> PithyResult<()> {
        let conn = self.storage.connection()?;
        let changed = conn.execute(
            &format!("UPDATE feeds SET {} WHERE id = ?1", ADVANCE_FETCH_TIME),
            params![feed_id, to_micros(fetch_time)],
        )?;
        ensure_updated(changed, feed_id)
    }

    fn update_feed_with_fetch_failure(
        &self,
        feed_id: i64,
        reason: &str,
        fetch_time: DateTime<Utc>,
    ) -> PithyResult<()> {
        let conn = self.storage.connection()?;
        let changed = conn.execute(
            &format!(
                "UPDATE feeds SET last_failure = ?3, last_failure_time = ?2, {} WHERE id = ?1",
                ADVANCE_FETCH_TIME
            ),
            params![feed_id, to_micros(fetch_time), reason],
        )?;
        ensure_updated(changed, feed_id)
    }
}

impl FeedRepository for SqliteFeedRepository {
    fn get_feed(&self, feed_id: i64) -> PithyResult<Option<Feed>> {
        let conn = self.storage.connection()?;
        conn.query_row(
            "SELECT id, name, url, etag, last_fetch_time, last_failure, last_failure_time
             FROM feeds WHERE id = ?1",
            [feed_id],
            row_to_feed,
        )
        .optional()
        .map_err(PithyError::from)
    }

    fn get_items_for_feed(&self, feed_id: i64) -> PithyResult<Vec<Item>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, feed_id, url, title, publication_time, creation_time
             FROM items WHERE feed_id = ?1 ORDER BY id",
        )?;

        let items = stmt.query_map([feed_id], row_to_item)?;
        items.collect::<Result<Vec<_>, _>>().map_err(PithyError::from)
    }
}
