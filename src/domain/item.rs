use chrono::{DateTime, Utc};
use serde::Serialize;

/// Normalized result of parsing one feed body. Items keep document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<ParsedItem>,
}

impl ParsedFeed {
    pub fn new(items: Vec<ParsedItem>) -> Self {
        Self { title: None, items }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItem {
    pub title: String,
    pub url: String,
    pub publication_time: Option<DateTime<Utc>>,
}

impl ParsedItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            publication_time: None,
        }
    }

    pub fn with_publication_time(mut self, publication_time: DateTime<Utc>) -> Self {
        self.publication_time = Some(publication_time);
        self
    }
}

/// A stored item. Never updated once inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub url: String,
    pub title: String,
    pub publication_time: Option<DateTime<Utc>>,
    pub creation_time: DateTime<Utc>,
}

/// An unread item as listed for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnreadEntry {
    pub item_id: i64,
    pub feed_id: i64,
    pub feed_name: Option<String>,
    pub title: String,
    pub url: String,
    pub publication_time: Option<DateTime<Utc>>,
}

/// What a successful ingestion wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub new_items: usize,
    pub unread_created: usize,
}
