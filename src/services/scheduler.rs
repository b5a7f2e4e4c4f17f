use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::{FetchOutcome, RefreshReport, RefreshStatus, StaleFeedCandidate};
use crate::errors::{PithyError, PithyResult};
use crate::services::reconciler::Reconciler;
use crate::sources::{parse_feed, FetchResponse, HttpFetcher};
use crate::storage::traits::FeedStateRepository;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between scheduling cycles.
    pub refresh_interval: Duration,
    /// A feed is due once its last attempt is older than this.
    pub staleness: Duration,
    /// Upper bound on fetches running at the same time.
    pub max_concurrent_fetches: usize,
    /// Hard limit on fetch, body read and parse for one feed.
    pub fetch_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            staleness: Duration::from_secs(600),
            max_concurrent_fetches: 10,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Periodically selects stale feeds and refreshes them on a bounded pool.
pub struct Scheduler<R: FeedStateRepository + 'static> {
    repository: Arc<R>,
    reconciler: Arc<Reconciler<R>>,
    fetcher: Arc<HttpFetcher>,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl<R: FeedStateRepository + 'static> Scheduler<R> {
    pub fn new(repository: Arc<R>, fetcher: HttpFetcher, config: SchedulerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
        Self {
            reconciler: Arc::new(Reconciler::new(Arc::clone(&repository))),
            repository,
            fetcher: Arc::new(fetcher),
            config,
            permits,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Runs one scheduling cycle: selects stale feeds and dispatches a
    /// refresh task for each one not already queued or running.
    ///
    /// A failing staleness query skips the cycle and yields an empty dispatch.
    pub async fn tick(&self) -> Dispatch {
        let Some(threshold) = staleness_threshold(Utc::now(), self.config.staleness) else {
            error!(
                staleness_secs = self.config.staleness.as_secs(),
                "staleness window out of range, skipping cycle"
            );
            return Dispatch::default();
        };

        let candidates = match self.stale_feeds(threshold).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "staleness query failed, skipping cycle");
                return Dispatch::default();
            }
        };

        let mut dispatch = Dispatch::default();
        for candidate in candidates {
            let Some(guard) = InFlightGuard::claim(&self.in_flight, candidate.feed_id) else {
                debug!(feed_id = candidate.feed_id, "feed already in flight");
                continue;
            };

            let permits = Arc::clone(&self.permits);
            let fetcher = Arc::clone(&self.fetcher);
            let reconciler = Arc::clone(&self.reconciler);
            let timeout = self.config.fetch_timeout;

            dispatch.tasks.spawn(async move {
                let _guard = guard;
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return RefreshReport {
                            feed_id: candidate.feed_id,
                            url: candidate.url,
                            status: RefreshStatus::Failure {
                                reason: "internal error".to_string(),
                            },
                        }
                    }
                };
                refresh_feed(candidate, &fetcher, reconciler, timeout).await
            });
        }

        if !dispatch.is_empty() {
            info!(feeds = dispatch.len(), "dispatched feed refreshes");
        }
        dispatch
    }

    /// Runs a single cycle and waits for every dispatched refresh.
    pub async fn refresh_once(&self) -> Vec<RefreshReport> {
        self.tick().await.wait().await
    }

    /// Starts the fixed-cadence loop. Cycles do not wait for the previous
    /// cycle's refreshes to finish.
    pub fn spawn(self) -> SchedulerHandle {
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel_rx.recv() => {
                        info!("scheduler shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        let dispatch = self.tick().await;
                        if !dispatch.is_empty() {
                            tokio::spawn(async move {
                                let reports = dispatch.wait().await;
                                log_cycle_summary(&reports);
                            });
                        }
                    }
                }
            }
        });

        SchedulerHandle { cancel_tx, join }
    }

    async fn stale_feeds(
        &self,
        threshold: DateTime<Utc>,
    ) -> PithyResult<Vec<StaleFeedCandidate>> {
        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || repository.get_feeds_unchecked_since(threshold))
            .await?
    }
}

/// `now - staleness`, or `None` when the window does not fit in a timestamp.
fn staleness_threshold(now: DateTime<Utc>, staleness: Duration) -> Option<DateTime<Utc>> {
    let window = chrono::Duration::from_std(staleness).ok()?;
    now.checked_sub_signed(window)
}

/// Refresh tasks spawned by one cycle.
#[derive(Default)]
pub struct Dispatch {
    tasks: JoinSet<RefreshReport>,
}

impl Dispatch {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for all tasks. Reports come back in completion order.
    pub async fn wait(mut self) -> Vec<RefreshReport> {
        let mut reports = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "refresh task aborted"),
            }
        }
        reports
    }
}

pub struct SchedulerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop. Refreshes already dispatched keep running.
    pub async fn stop(self) -> PithyResult<()> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(PithyError::from)
    }
}

/// Keeps a feed id in the in-flight set until the refresh task ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<i64>>>,
    feed_id: i64,
}

impl InFlightGuard {
    fn claim(set: &Arc<Mutex<HashSet<i64>>>, feed_id: i64) -> Option<Self> {
        let mut in_flight = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(feed_id) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            feed_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self
            .set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.feed_id);
    }
}

async fn refresh_feed<R: FeedStateRepository + 'static>(
    candidate: StaleFeedCandidate,
    fetcher: &HttpFetcher,
    reconciler: Arc<Reconciler<R>>,
    timeout: Duration,
) -> RefreshReport {
    let feed_id = candidate.feed_id;

    let outcome = match tokio::time::timeout(timeout, fetch_and_parse(fetcher, &candidate)).await
    {
        Ok(outcome) => outcome,
        Err(_) => FetchOutcome::failure(PithyError::Timeout.failure_reason()),
    };
    if let FetchOutcome::Failure { reason, .. } = &outcome {
        warn!(feed_id, url = %candidate.url, reason = %reason, "feed refresh failed");
    }

    let recorder = Arc::clone(&reconciler);
    let status = match tokio::task::spawn_blocking(move || recorder.record(feed_id, outcome)).await
    {
        Ok(status) => status,
        Err(e) => {
            let reason = PithyError::from(e).failure_reason();
            error!(feed_id, reason = %reason, "recording refresh result panicked");
            let fallback = reason.clone();
            tokio::task::spawn_blocking(move || {
                reconciler.record(feed_id, FetchOutcome::failure(fallback))
            })
            .await
            .unwrap_or(RefreshStatus::Failure { reason })
        }
    };

    RefreshReport {
        feed_id,
        url: candidate.url,
        status,
    }
}

async fn fetch_and_parse(fetcher: &HttpFetcher, candidate: &StaleFeedCandidate) -> FetchOutcome {
    let fetch_time = Utc::now();
    let response = match fetcher.fetch(&candidate.url, candidate.etag.as_deref()).await {
        Ok(response) => response,
        Err(e) => {
            return FetchOutcome::Failure {
                reason: e.failure_reason(),
                fetch_time,
            }
        }
    };

    match response {
        FetchResponse::NotModified => FetchOutcome::Unchanged { fetch_time },
        FetchResponse::Fetched { body, etag } => match parse_feed(&body, &candidate.url) {
            Ok(parsed_feed) => FetchOutcome::Success {
                parsed_feed,
                new_etag: etag,
                fetch_time,
            },
            Err(e) => FetchOutcome::Failure {
                reason: e.failure_reason(),
                fetch_time,
            },
        },
    }
}

fn log_cycle_summary(reports: &[RefreshReport]) {
    let failed = reports.iter().filter(|r| r.status.is_failure()).count();
    let unchanged = reports
        .iter()
        .filter(|r| r.status == RefreshStatus::Unchanged)
        .count();
    let new_items: usize = reports
        .iter()
        .map(|r| match r.status {
            RefreshStatus::Success { new_items, .. } => new_items,
            _ => 0,
        })
        .sum();

    info!(
        feeds = reports.len(),
        failed,
        unchanged,
        new_items,
        "refresh cycle finished"
    );
}
