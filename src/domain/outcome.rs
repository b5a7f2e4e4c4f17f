use chrono::{DateTime, Utc};

use super::ParsedFeed;

/// Result of one fetch attempt, before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        parsed_feed: ParsedFeed,
        new_etag: Option<String>,
        fetch_time: DateTime<Utc>,
    },
    Unchanged {
        fetch_time: DateTime<Utc>,
    },
    Failure {
        reason: String,
        fetch_time: DateTime<Utc>,
    },
}

impl FetchOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            reason: reason.into(),
            fetch_time: Utc::now(),
        }
    }
}

/// What was durably recorded for a feed at the end of its refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Success {
        new_items: usize,
        unread_created: usize,
    },
    Unchanged,
    Failure {
        reason: String,
    },
}

impl RefreshStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, RefreshStatus::Failure { .. })
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshStatus::Success { new_items, .. } => {
                write!(f, "ok ({} new item(s))", new_items)
            }
            RefreshStatus::Unchanged => write!(f, "not modified"),
            RefreshStatus::Failure { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// One feed's refresh result as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub feed_id: i64,
    pub url: String,
    pub status: RefreshStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_status_display() {
        let status = RefreshStatus::Success {
            new_items: 3,
            unread_created: 6,
        };
        assert_eq!(status.to_string(), "ok (3 new item(s))");
        assert_eq!(RefreshStatus::Unchanged.to_string(), "not modified");
        let failed = RefreshStatus::Failure {
            reason: "http 500".to_string(),
        };
        assert_eq!(failed.to_string(), "failed: http 500");
        assert!(failed.is_failure());
    }
}
