use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::domain::{FetchOutcome, RefreshStatus};
use crate::errors::PithyError;
use crate::storage::traits::FeedStateRepository;

const STORAGE_ERROR: &str = "storage error";

/// Records fetch outcomes against the feed-state store.
///
/// Each outcome maps to exactly one persistence operation. When recording a
/// success or an unchanged result fails, the feed is marked as failed instead
/// so the next cycle fetches it again from the network.
pub struct Reconciler<R: FeedStateRepository> {
    repository: Arc<R>,
}

impl<R: FeedStateRepository> Reconciler<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn record(&self, feed_id: i64, outcome: FetchOutcome) -> RefreshStatus {
        match outcome {
            FetchOutcome::Success {
                parsed_feed,
                new_etag,
                fetch_time,
            } => match self.repository.update_feed_with_fetch_success(
                feed_id,
                &parsed_feed,
                new_etag,
                fetch_time,
            ) {
                Ok(summary) => {
                    debug!(
                        feed_id,
                        new_items = summary.new_items,
                        unread_created = summary.unread_created,
                        "feed ingested"
                    );
                    RefreshStatus::Success {
                        new_items: summary.new_items,
                        unread_created: summary.unread_created,
                    }
                }
                Err(e) => self.degrade(feed_id, e, fetch_time),
            },
            FetchOutcome::Unchanged { fetch_time } => {
                match self
                    .repository
                    .update_feed_with_fetch_unchanged(feed_id, fetch_time)
                {
                    Ok(()) => {
                        debug!(feed_id, "feed unchanged");
                        RefreshStatus::Unchanged
                    }
                    Err(e) => self.degrade(feed_id, e, fetch_time),
                }
            }
            FetchOutcome::Failure { reason, fetch_time } => {
                self.record_failure(feed_id, reason, fetch_time)
            }
        }
    }

    fn degrade(&self, feed_id: i64, err: PithyError, fetch_time: DateTime<Utc>) -> RefreshStatus {
        warn!(feed_id, error = %err, "could not record fetch result");
        self.record_failure(feed_id, STORAGE_ERROR.to_string(), fetch_time)
    }

    fn record_failure(
        &self,
        feed_id: i64,
        reason: String,
        fetch_time: DateTime<Utc>,
    ) -> RefreshStatus {
        if let Err(e) = self
            .repository
            .update_feed_with_fetch_failure(feed_id, &reason, fetch_time)
        {
            error!(feed_id, reason = %reason, error = %e, "could not record fetch failure");
        }
        RefreshStatus::Failure { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IngestSummary, ParsedFeed, ParsedItem};
    use crate::storage::traits::MockFeedStateRepository;

    fn success_outcome() -> FetchOutcome {
        FetchOutcome::Success {
            parsed_feed: ParsedFeed::new(vec![ParsedItem::new("Post", "https://example.com/1")]),
            new_etag: Some("\"v1\"".to_string()),
            fetch_time: Utc::now(),
        }
    }

    #[test]
    fn test_success_is_recorded_once() {
        let mut repo = MockFeedStateRepository::new();
        repo.expect_update_feed_with_fetch_success()
            .withf(|feed_id, parsed, etag, _| {
                *feed_id == 1 && parsed.items.len() == 1 && etag.as_deref() == Some("\"v1\"")
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(IngestSummary {
                    new_items: 1,
                    unread_created: 2,
                })
            });
        repo.expect_update_feed_with_fetch_failure().never();

        let status = Reconciler::new(Arc::new(repo)).record(1, success_outcome());

        assert_eq!(
            status,
            RefreshStatus::Success {
                new_items: 1,
                unread_created: 2
            }
        );
    }

    #[test]
    fn test_storage_error_on_success_degrades_to_failure() {
        let mut repo = MockFeedStateRepository::new();
        repo.expect_update_feed_with_fetch_success()
            .times(1)
            .returning(|_, _, _, _| Err(PithyError::StorageUnavailable("disk full".to_string())));
        repo.expect_update_feed_with_fetch_failure()
            .withf(|feed_id, reason, _| *feed_id == 1 && reason.to_string() == STORAGE_ERROR)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let status = Reconciler::new(Arc::new(repo)).record(1, success_outcome());

        assert_eq!(
            status,
            RefreshStatus::Failure {
                reason: STORAGE_ERROR.to_string()
            }
        );
    }

    #[test]
    fn test_unchanged_touches_only_fetch_time() {
        let mut repo = MockFeedStateRepository::new();
        repo.expect_update_feed_with_fetch_unchanged()
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_update_feed_with_fetch_success().never();
        repo.expect_update_feed_with_fetch_failure().never();

        let status = Reconciler::new(Arc::new(repo)).record(
            3,
            FetchOutcome::Unchanged {
                fetch_time: Utc::now(),
            },
        );

        assert_eq!(status, RefreshStatus::Unchanged);
    }

    #[test]
    fn test_failure_reason_is_stored() {
        let mut repo = MockFeedStateRepository::new();
        repo.expect_update_feed_with_fetch_failure()
            .withf(|feed_id, reason, _| *feed_id == 2 && reason.to_string() == "http 500")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let status = Reconciler::new(Arc::new(repo)).record(2, FetchOutcome::failure("http 500"));

        assert!(status.is_failure());
    }

    #[test]
    fn test_failed_failure_write_is_still_reported() {
        let mut repo = MockFeedStateRepository::new();
        repo.expect_update_feed_with_fetch_failure()
            .times(1)
            .returning(|_, _, _| Err(PithyError::StorageUnavailable("locked".to_string())));

        let status = Reconciler::new(Arc::new(repo)).record(2, FetchOutcome::failure("timeout"));

        assert_eq!(
            status,
            RefreshStatus::Failure {
                reason: "timeout".to_string()
            }
        );
    }
}
