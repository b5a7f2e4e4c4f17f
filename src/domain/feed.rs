use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed {
    pub id: i64,
    pub name: Option<String>,
    pub url: String,
    pub etag: Option<String>,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// The minimal projection a fetch task needs, produced by the staleness query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleFeedCandidate {
    pub feed_id: i64,
    pub url: String,
    pub etag: Option<String>,
}

impl StaleFeedCandidate {
    pub fn new(feed_id: i64, url: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            feed_id,
            url: url.into(),
            etag,
        }
    }
}

/// A feed as seen by one of its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub feed_id: i64,
    pub name: Option<String>,
    pub url: String,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
}

impl FeedSummary {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_url() {
        let mut summary = FeedSummary {
            feed_id: 1,
            name: None,
            url: "https://example.com/feed.xml".to_string(),
            last_fetch_time: None,
            last_failure: None,
        };
        assert_eq!(summary.display_name(), "https://example.com/feed.xml");
        summary.name = Some("Example".to_string());
        assert_eq!(summary.display_name(), "Example");
    }
}
