use rusqlite::params;

use crate::domain::UnreadEntry;
use crate::errors::{PithyError, PithyResult};
use crate::storage::sqlite::connection::from_micros;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::UnreadItemRepository;

pub struct SqliteUnreadItemRepository {
    storage: SqliteStorage,
}

impl SqliteUnreadItemRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl UnreadItemRepository for SqliteUnreadItemRepository {
    fn get_unread_items(&self, user_id: i64) -> PithyResult<Vec<UnreadEntry>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(
            "SELECT items.id, feeds.id, feeds.name, items.title, items.url, items.publication_time
             FROM feeds
               JOIN items ON feeds.id = items.feed_id
               JOIN unread_items ON items.id = unread_items.item_id
             WHERE unread_items.user_id = ?1
             ORDER BY items.publication_time ASC, items.id ASC",
        )?;

        let entries = stmt.query_map([user_id], |row| {
            let publication_time: Option<i64> = row.get(5)?;
            Ok(UnreadEntry {
                item_id: row.get(0)?,
                feed_id: row.get(1)?,
                feed_name: row.get(2)?,
                title: row.get(3)?,
                url: row.get(4)?,
                publication_time: publication_time.map(from_micros),
            })
        })?;

        entries
            .collect::<Result<Vec<_>, _>>()
            .map_err(PithyError::from)
    }

    fn mark_item_read(&self, user_id: i64, item_id: i64) -> PithyResult<()> {
        let conn = self.storage.connection()?;
        let removed = conn.execute(
            "DELETE FROM unread_items WHERE user_id = ?1 AND item_id = ?2",
            params![user_id, item_id],
        )?;
        if removed == 0 {
            return Err(PithyError::ItemNotFound(item_id));
        }
        Ok(())
    }

    fn mark_all_items_read(&self, user_id: i64) -> PithyResult<usize> {
        let conn = self.storage.connection()?;
        let removed = conn.execute("DELETE FROM unread_items WHERE user_id = ?1", [user_id])?;
        Ok(removed)
    }
}
