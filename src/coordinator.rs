// Refresh coordinator: the single owner of the reservation snapshot
//
// Keeps one live Snapshot behind an Arc, refreshes it at most once per
// freshness window, and coalesces concurrent refresh requests onto one
// shared in-flight future so every caller observes the same outcome. The
// refresh itself runs as a spawned task, so it finishes even when every
// caller has gone away.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::previo_api::{FetchError, ReservationFetcher, SearchRequest};
use crate::previo_xml::{ReservationRecord, Term};

type InFlight = Shared<BoxFuture<'static, Arc<Snapshot>>>;

// Coordinator configuration options
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    // Minimum age before a demand refresh hits the network
    pub min_interval: Duration,
    // Period of the background refresh timer; zero disables the timer
    pub update_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(15 * 60),
            update_interval: Duration::from_secs(15 * 60),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// The coordinator's view of the upstream feed.
///
/// A failed refresh carries the previous `records`, `fetched_at` and
/// `last_success_at` forward and only sets `error`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<ReservationRecord>,
    pub fetched_at: Option<Instant>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub error: Option<FetchError>,
}

impl Snapshot {
    pub fn is_fresh(&self, min_interval: Duration, now: Instant) -> bool {
        self.fetched_at
            .map_or(false, |at| now.saturating_duration_since(at) <= min_interval)
    }

    pub fn last_update_success(&self) -> bool {
        self.fetched_at.is_some() && self.error.is_none()
    }
}

// Counters for the coordinator
#[derive(Debug, Default)]
struct CoordinatorStats {
    fetch_count: AtomicUsize,
    success_count: AtomicUsize,
    failure_count: AtomicUsize,
    cache_hits: AtomicUsize,
    coalesced_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoordinatorStatsReport {
    pub fetch_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub cache_hits: usize,
    pub coalesced_count: usize,
}

/// Read access to a shared snapshot with bounded-frequency refresh.
#[async_trait]
pub trait Refreshable: Send + Sync + 'static {
    // The live snapshot, never triggers a fetch
    fn current(&self) -> Arc<Snapshot>;

    // The live snapshot if fresh, otherwise the outcome of one (possibly shared) refresh
    async fn get_snapshot(&self) -> Arc<Snapshot>;

    // Refresh regardless of age, joining any refresh already in flight
    async fn force_refresh(&self) -> Arc<Snapshot>;
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    fetcher: Arc<dyn ReservationFetcher>,
    request: SearchRequest,
    config: CoordinatorConfig,
    snapshot: RwLock<Arc<Snapshot>>,
    in_flight: Mutex<Option<InFlight>>,
    stats: CoordinatorStats,
    cancel: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshCoordinator {
    pub fn new(
        fetcher: Arc<dyn ReservationFetcher>,
        request: SearchRequest,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                fetcher,
                request,
                config,
                snapshot: RwLock::new(Arc::new(Snapshot::default())),
                in_flight: Mutex::new(None),
                stats: CoordinatorStats::default(),
                cancel: CancellationToken::new(),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn hotel_id(&self) -> &str {
        &self.inner.request.hotel_id
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.inner.current()
    }

    pub async fn get_snapshot(&self) -> Arc<Snapshot> {
        match self.begin_refresh(false) {
            Ok(in_flight) => in_flight.await,
            Err(current) => current,
        }
    }

    pub async fn force_refresh(&self) -> Arc<Snapshot> {
        match self.begin_refresh(true) {
            Ok(in_flight) => in_flight.await,
            Err(current) => current,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // Join the in-flight refresh or start one. Err carries the snapshot to
    // return as-is (fresh, or the coordinator is shut down).
    fn begin_refresh(&self, force: bool) -> Result<InFlight, Arc<Snapshot>> {
        let inner = &self.inner;
        let mut slot = inner.in_flight.lock();

        if let Some(in_flight) = slot.as_ref() {
            inner.stats.coalesced_count.fetch_add(1, Ordering::SeqCst);
            return Ok(in_flight.clone());
        }

        let current = self.current();
        if inner.cancel.is_cancelled()
            || (!force && current.is_fresh(inner.config.min_interval, Instant::now()))
        {
            inner.stats.cache_hits.fetch_add(1, Ordering::SeqCst);
            return Err(current);
        }

        let task = tokio::spawn(run_refresh(Arc::clone(inner)));
        let fallback = Arc::clone(inner);
        let in_flight = async move {
            match task.await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(error = %error, "refresh task did not complete");
                    fallback.in_flight.lock().take();
                    fallback.current()
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(in_flight.clone());
        Ok(in_flight)
    }

    /// Spawn the background refresh timer. Its first tick is skipped so it
    /// does not repeat the refresh done at setup.
    pub fn start(&self) {
        let period = self.inner.config.update_interval;
        if period.is_zero() || self.is_shut_down() {
            return;
        }

        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            return;
        }

        info!(period_secs = period.as_secs(), "starting reservation refresh timer");
        *timer = Some(tokio::spawn(refresh_task(
            Arc::downgrade(&self.inner),
            period,
            self.inner.cancel.clone(),
        )));
    }

    /// Stop the timer and cancel any in-flight refresh. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.in_flight.lock().take();

        let timer = self.inner.timer.lock().take();
        if let Some(handle) = timer {
            let _ = handle.await;
        }

        info!(hotel_id = %self.inner.request.hotel_id, "refresh coordinator stopped");
    }

    pub fn stats(&self) -> CoordinatorStatsReport {
        let stats = &self.inner.stats;
        CoordinatorStatsReport {
            fetch_count: stats.fetch_count.load(Ordering::SeqCst),
            success_count: stats.success_count.load(Ordering::SeqCst),
            failure_count: stats.failure_count.load(Ordering::SeqCst),
            cache_hits: stats.cache_hits.load(Ordering::SeqCst),
            coalesced_count: stats.coalesced_count.load(Ordering::SeqCst),
        }
    }
}

impl CoordinatorInner {
    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }
}

// The last handle is gone: stop the timer
impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Refreshable for RefreshCoordinator {
    fn current(&self) -> Arc<Snapshot> {
        RefreshCoordinator::current(self)
    }

    async fn get_snapshot(&self) -> Arc<Snapshot> {
        RefreshCoordinator::get_snapshot(self).await
    }

    async fn force_refresh(&self) -> Arc<Snapshot> {
        RefreshCoordinator::force_refresh(self).await
    }
}

// One fetch, then publish the next snapshot and clear the in-flight slot
async fn run_refresh(inner: Arc<CoordinatorInner>) -> Arc<Snapshot> {
    inner.stats.fetch_count.fetch_add(1, Ordering::SeqCst);
    let timeout = inner.config.fetch_timeout;

    let outcome = tokio::select! {
        biased;
        () = inner.cancel.cancelled() => Err(FetchError::Transport("refresh cancelled".to_string())),
        result = tokio::time::timeout(timeout, inner.fetcher.fetch(&inner.request, Term::today())) => {
            result.unwrap_or_else(|_| {
                Err(FetchError::Transport(format!(
                    "fetch timed out after {}s",
                    timeout.as_secs()
                )))
            })
        }
    };

    let previous = inner.snapshot.read().clone();
    let next = match outcome {
        Ok(records) => {
            inner.stats.success_count.fetch_add(1, Ordering::SeqCst);
            debug!(count = records.len(), "reservation snapshot updated");
            Snapshot {
                records,
                fetched_at: Some(Instant::now()),
                last_success_at: Some(Utc::now()),
                error: None,
            }
        }
        Err(error) => {
            inner.stats.failure_count.fetch_add(1, Ordering::SeqCst);
            warn!(error = %error, code = ?error.code(), "error communicating with API, keeping last snapshot");
            Snapshot {
                records: previous.records.clone(),
                fetched_at: previous.fetched_at,
                last_success_at: previous.last_success_at,
                error: Some(error),
            }
        }
    };

    let next = Arc::new(next);
    *inner.snapshot.write() = Arc::clone(&next);
    inner.in_flight.lock().take();
    next
}

// Holds the coordinator weakly so dropping every handle ends the task
async fn refresh_task(inner: Weak<CoordinatorInner>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                let snapshot = RefreshCoordinator { inner }.force_refresh().await;
                if let Some(error) = &snapshot.error {
                    warn!(error = %error, "periodic refresh failed");
                }
            }
        }
    }
}
