//! The delivery scheduler and its application-facing surface.
//!
//! Delivery is strictly sequential: one background task owns the whole
//! attempt/cooldown cycle, so at most one transport call is ever in flight
//! and no lock beyond the queue's own is needed. Enqueues and snapshots only
//! touch the queue briefly and may interleave freely with a pending send.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::event::{EventCategory, EventRecord};
use crate::queue::DeliveryQueue;
use crate::snapshot::{self, SnapshotError};
use crate::store::{SnapshotStore, StoreError};
use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("relay already initialized")]
    AlreadyInitialized,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Store key the queue snapshot is saved under.
    pub snapshot_key: String,
    /// Lower bound of the post-attempt cooldown.
    pub cooldown_min_ms: u64,
    /// Upper bound of the post-attempt cooldown.
    pub cooldown_max_ms: u64,
    /// Number of events `emit_test_burst` enqueues.
    pub test_burst_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            snapshot_key: "DelayedEvents".to_string(),
            cooldown_min_ms: 1_000,
            cooldown_max_ms: 3_000,
            test_burst_size: 100,
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.snapshot_key.is_empty() {
            return Err(RelayError::Config("snapshot_key cannot be empty".into()));
        }
        if self.cooldown_min_ms > self.cooldown_max_ms {
            return Err(RelayError::Config(format!(
                "cooldown_min_ms ({}) exceeds cooldown_max_ms ({})",
                self.cooldown_min_ms, self.cooldown_max_ms
            )));
        }
        Ok(())
    }

    /// Uniform draw from `[min, max]`, taken fresh at each cooldown entry.
    /// With `min == max` the delay is fixed, which is what timing tests use.
    fn sample_cooldown(&self) -> Duration {
        if self.cooldown_min_ms >= self.cooldown_max_ms {
            return Duration::from_millis(self.cooldown_min_ms);
        }
        let mut rng = StdRng::from_entropy();
        Duration::from_millis(rng.gen_range(self.cooldown_min_ms..=self.cooldown_max_ms))
    }
}

// ============================================================================
// Scheduler state and metrics
// ============================================================================

/// Where the delivery task currently is in its cycle. Purely observational;
/// the single-inflight discipline comes from the task structure itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No send outstanding, no cooldown pending.
    Idle,
    /// A transport call is in flight for the current head.
    Sending,
    /// Between a resolved attempt and eligibility for the next one.
    CoolingDown,
}

#[derive(Debug, Default)]
struct RelayMetrics {
    events_tracked: AtomicU64,
    sends_attempted: AtomicU64,
    sends_succeeded: AtomicU64,
    sends_failed: AtomicU64,
    snapshots_saved: AtomicU64,
    snapshots_restored: AtomicU64,
    contract_violations: AtomicU64,
}

impl RelayMetrics {
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_tracked: self.events_tracked.load(Ordering::Relaxed),
            sends_attempted: self.sends_attempted.load(Ordering::Relaxed),
            sends_succeeded: self.sends_succeeded.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
            snapshots_saved: self.snapshots_saved.load(Ordering::Relaxed),
            snapshots_restored: self.snapshots_restored.load(Ordering::Relaxed),
            contract_violations: self.contract_violations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_tracked: u64,
    pub sends_attempted: u64,
    pub sends_succeeded: u64,
    pub sends_failed: u64,
    pub snapshots_saved: u64,
    pub snapshots_restored: u64,
    pub contract_violations: u64,
}

// ============================================================================
// EventRelay
// ============================================================================

struct RelayInner {
    config: RelayConfig,
    queue: RwLock<DeliveryQueue>,
    state: RwLock<SchedulerState>,
    work_available: Notify,
    metrics: RelayMetrics,
}

impl RelayInner {
    async fn set_state(&self, state: SchedulerState) {
        *self.state.write().await = state;
    }
}

/// Client-side reliable event delivery: events enqueue immediately, survive
/// restarts via snapshots, and are delivered one at a time with a randomized
/// cooldown between attempts. A failed attempt retains the head for retry;
/// only a confirmed success removes it.
pub struct EventRelay<T, S> {
    inner: Arc<RelayInner>,
    transport: Arc<T>,
    store: Arc<S>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T, S> EventRelay<T, S>
where
    T: Transport + 'static,
    S: SnapshotStore,
{
    pub fn new(transport: Arc<T>, store: Arc<S>, config: RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RelayInner {
                config,
                queue: RwLock::new(DeliveryQueue::new()),
                state: RwLock::new(SchedulerState::Idle),
                work_available: Notify::new(),
                metrics: RelayMetrics::default(),
            }),
            transport,
            store,
            worker: Mutex::new(None),
        })
    }

    /// Process-start hook: restores any persisted queue, then starts the
    /// delivery task and nudges it in case restored work exists.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), RelayError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(RelayError::AlreadyInitialized);
        }

        match self.store.load(&self.inner.config.snapshot_key).await? {
            Some(raw) => {
                let restored = snapshot::decode(&raw)?;
                let count = restored.len();
                self.inner.queue.write().await.load_from_ordered_list(restored);
                self.inner
                    .metrics
                    .snapshots_restored
                    .fetch_add(1, Ordering::Relaxed);
                info!(restored = count, "restored pending events from snapshot");
            }
            None => {
                debug!("no snapshot present, starting with an empty queue");
            }
        }

        let inner = Arc::clone(&self.inner);
        let transport = Arc::clone(&self.transport);
        *worker = Some(tokio::spawn(run_delivery_loop(inner, transport)));
        self.inner.work_available.notify_one();
        Ok(())
    }

    /// Public entry point: enqueue one event and nudge the scheduler.
    /// Never fails and never waits on delivery; delivery failures are
    /// absorbed by the retry loop and invisible to the caller.
    #[instrument(skip(self, payload), fields(category = %category))]
    pub async fn track_event(&self, category: EventCategory, payload: impl Into<String>) {
        let record = EventRecord::new(category, payload);
        self.inner.queue.write().await.enqueue(record);
        self.inner
            .metrics
            .events_tracked
            .fetch_add(1, Ordering::Relaxed);
        self.inner.work_available.notify_one();
    }

    /// Diagnostic pipeline exerciser: enqueues `test_burst_size` copies of
    /// one event in a single lock scope.
    #[instrument(skip(self, payload), fields(category = %category))]
    pub async fn emit_test_burst(&self, category: EventCategory, payload: &str) {
        let count = self.inner.config.test_burst_size;
        {
            let mut queue = self.inner.queue.write().await;
            for _ in 0..count {
                queue.enqueue(EventRecord::new(category, payload));
            }
        }
        self.inner
            .metrics
            .events_tracked
            .fetch_add(count as u64, Ordering::Relaxed);
        self.inner.work_available.notify_one();
        info!(count, "test burst enqueued");
    }

    /// Suspend hook: persists the current queue contents, including a head
    /// whose send is still outstanding. Does not wait for that send; the
    /// snapshot read lock serializes strictly behind any completed pop, so a
    /// saved snapshot never shows a half-applied mutation.
    #[instrument(skip(self))]
    pub async fn on_suspend(&self) -> Result<(), RelayError> {
        let pending = self.inner.queue.read().await.to_ordered_list();
        let encoded = snapshot::encode(&pending)?;
        self.store
            .save(&self.inner.config.snapshot_key, &encoded)
            .await?;
        self.inner
            .metrics
            .snapshots_saved
            .fetch_add(1, Ordering::Relaxed);
        info!(pending = pending.len(), "queue snapshot persisted");
        Ok(())
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.queue.read().await.len()
    }

    pub async fn pending_events(&self) -> Vec<EventRecord> {
        self.inner.queue.read().await.to_ordered_list()
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        *self.inner.state.read().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Stops the delivery task. An in-flight attempt is cancelled; its head
    /// was never popped, so it is retried after the next restore.
    pub async fn shutdown(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl<T, S> Drop for EventRelay<T, S> {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.worker.try_lock() {
            if let Some(handle) = worker.take() {
                handle.abort();
            }
        }
    }
}

/// The state machine. One cycle: peek head (never popped before the attempt
/// resolves), send, pop on success / retain on failure, cool down, repeat.
/// With an empty queue it parks on the notifier until an enqueue or restore
/// nudges it.
async fn run_delivery_loop<T: Transport>(inner: Arc<RelayInner>, transport: Arc<T>) {
    loop {
        let head = { inner.queue.read().await.peek_head().cloned() };
        let Some(record) = head else {
            inner.set_state(SchedulerState::Idle).await;
            // notify_one stores a permit, so an enqueue landing between the
            // peek and this await still wakes us immediately
            inner.work_available.notified().await;
            continue;
        };

        inner.set_state(SchedulerState::Sending).await;
        inner
            .metrics
            .sends_attempted
            .fetch_add(1, Ordering::Relaxed);

        match transport.send(&record).await {
            Ok(()) => {
                let popped = inner.queue.write().await.pop_head();
                if let Err(e) = popped {
                    // Corrupted scheduler state: nothing sane to retry.
                    inner
                        .metrics
                        .contract_violations
                        .fetch_add(1, Ordering::Relaxed);
                    inner.set_state(SchedulerState::Idle).await;
                    error!(error = %e, "delivery queue contract violated, stopping delivery");
                    return;
                }
                inner
                    .metrics
                    .sends_succeeded
                    .fetch_add(1, Ordering::Relaxed);
                debug!(category = %record.category(), "event delivered");
            }
            Err(e) => {
                inner.metrics.sends_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    category = %record.category(),
                    "send attempt failed, head retained for retry"
                );
            }
        }

        // Unconditional throttle between attempts, success or failure alike.
        inner.set_state(SchedulerState::CoolingDown).await;
        tokio::time::sleep(inner.config.sample_cooldown()).await;
        inner.set_state(SchedulerState::Idle).await;
    }
}
