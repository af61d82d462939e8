//! Telemetry Collector & Recorder (spec §4.7): a bounded in-process queue
//! drained in batches by a background task, with session tracking and
//! correlation ID plumbing on top.

pub mod correlation;
pub mod event;
pub mod session;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

pub use event::{
    ContextData, ErrorData, EventValidationError, OperationType, PerformanceMetrics,
    QualityMetrics, StrategyMetrics, TelemetryEvent, ViewportSize,
};
pub use session::{SessionSummary, SessionTracker};

use crate::storage::EventStorage;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry collection is disabled")]
    Disabled,
    #[error(transparent)]
    InvalidEvent(#[from] EventValidationError),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub buffer_capacity: usize,
    pub batch_min: usize,
    pub batch_max: usize,
    pub flush_interval: Duration,
    pub target_batch_latency: Duration,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub max_retry_attempts: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_capacity: 1000,
            batch_min: 10,
            batch_max: 100,
            flush_interval: Duration::from_secs(1),
            target_batch_latency: Duration::from_millis(100),
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(300),
            max_retry_attempts: 5,
        }
    }
}

struct Queue {
    events: VecDeque<TelemetryEvent>,
    buffer_overflows: u64,
}

/// Collects events into a bounded queue; a spawned task drains it in
/// batches against `storage`. Oldest events are evicted on overflow
/// rather than rejecting new ones, matching the "never block the caller"
/// requirement.
pub struct TelemetryCollector {
    config: TelemetryConfig,
    queue: Mutex<Queue>,
    current_batch_size: AtomicU64,
    storage: Arc<dyn EventStorage>,
    sessions: SessionTracker,
    /// Signaled by `enqueue` once the queue reaches `current_batch_size`,
    /// so the drain task can wake before `flush_interval` elapses.
    drain_notify: Notify,
}

impl TelemetryCollector {
    pub fn new(config: TelemetryConfig, storage: Arc<dyn EventStorage>) -> Arc<Self> {
        Arc::new(Self {
            current_batch_size: AtomicU64::new(config.batch_min as u64),
            config,
            queue: Mutex::new(Queue {
                events: VecDeque::new(),
                buffer_overflows: 0,
            }),
            storage,
            sessions: SessionTracker::default(),
            drain_notify: Notify::new(),
        })
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub async fn buffer_overflows(&self) -> u64 {
        self.queue.lock().await.buffer_overflows
    }

    /// Builds, validates, and enqueues an event. `correlation_id` falls
    /// back to the thread-local current correlation, then to a fresh
    /// random one.
    pub async fn collect_event(
        &self,
        selector_name: &str,
        operation_type: OperationType,
        correlation_id: Option<String>,
        build: impl FnOnce(&mut TelemetryEvent),
    ) -> Result<TelemetryEvent, TelemetryError> {
        if !self.config.enabled {
            return Err(TelemetryError::Disabled);
        }
        let correlation_id = correlation_id
            .or_else(correlation::current)
            .unwrap_or_else(|| correlation::random(16));
        let mut event = TelemetryEvent::new(selector_name, correlation_id, operation_type);
        build(&mut event);
        event.validate()?;
        self.enqueue(event.clone()).await;
        Ok(event)
    }

    async fn enqueue(&self, event: TelemetryEvent) {
        let reached_batch_size;
        {
            let mut queue = self.queue.lock().await;
            if queue.events.len() >= self.config.buffer_capacity {
                queue.events.pop_front();
                queue.buffer_overflows += 1;
                warn!(
                    buffer_overflows = queue.buffer_overflows,
                    "telemetry buffer overflow, oldest event evicted"
                );
            }
            queue.events.push_back(event);
            let batch_size = self.current_batch_size.load(Ordering::Relaxed) as usize;
            reached_batch_size = queue.events.len() >= batch_size;
        }
        if reached_batch_size {
            self.drain_notify.notify_one();
        }
    }

    async fn drain_batch(&self) -> Vec<TelemetryEvent> {
        let batch_size = self.current_batch_size.load(Ordering::Relaxed) as usize;
        let mut queue = self.queue.lock().await;
        let take = batch_size.min(queue.events.len());
        queue.events.drain(..take).collect()
    }

    /// Shrinks or grows the next batch size toward `target_batch_latency`,
    /// bounded by `[batch_min, batch_max]`.
    fn adapt_batch_size(&self, last_batch_duration: Duration) {
        let current = self.current_batch_size.load(Ordering::Relaxed) as i64;
        let target_ms = self.config.target_batch_latency.as_millis() as i64;
        let actual_ms = last_batch_duration.as_millis() as i64;
        let next = if actual_ms > target_ms {
            current - 1
        } else {
            current + 1
        };
        let clamped = next.clamp(self.config.batch_min as i64, self.config.batch_max as i64);
        self.current_batch_size.store(clamped as u64, Ordering::Relaxed);
    }

    async fn flush_with_retry(&self, batch: &[TelemetryEvent]) -> Result<(), TelemetryError> {
        let mut attempt = 0;
        let mut delay = self.config.retry_base_delay;
        loop {
            match self.storage.store_events_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt + 1 >= self.config.max_retry_attempts => {
                    error!(error = %err, events_dropped = batch.len(), "telemetry storage_error, dropping batch");
                    return Err(TelemetryError::Storage(err.to_string()));
                }
                Err(err) => {
                    let jitter = 1.0 + rand::thread_rng().gen_range(-0.1..=0.1);
                    let sleep_for = Duration::from_secs_f64(delay.as_secs_f64() * jitter);
                    warn!(error = %err, attempt, delay_ms = sleep_for.as_millis() as u64, "telemetry flush failed, retrying");
                    tokio::time::sleep(sleep_for).await;
                    delay = (delay * 2).min(self.config.retry_max_delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Drives the batched drain loop: fires when the queue reaches the
    /// current batch size or `flush_interval` elapses, whichever first.
    pub fn spawn_drain_task(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.flush_interval) => {}
                    _ = self.drain_notify.notified() => {}
                }
                let batch = self.drain_batch().await;
                if batch.is_empty() {
                    continue;
                }
                let started = Instant::now();
                let _ = self.flush_with_retry(&batch).await;
                self.adapt_batch_size(started.elapsed());
                debug!(batch_len = batch.len(), "telemetry batch flushed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingStorage {
        stored: AtomicUsize,
    }

    #[async_trait]
    impl EventStorage for RecordingStorage {
        async fn store_event(&self, _event: &TelemetryEvent) -> Result<(), StorageError> {
            Ok(())
        }

        async fn store_events_batch(&self, events: &[TelemetryEvent]) -> Result<(), StorageError> {
            self.stored.fetch_add(events.len(), Ordering::Relaxed);
            Ok(())
        }

        async fn load_events(
            &self,
            _selector_name: Option<&str>,
            _limit: Option<usize>,
        ) -> Result<Vec<TelemetryEvent>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn disabled_collector_rejects_events() {
        let collector = TelemetryCollector::new(
            TelemetryConfig {
                enabled: false,
                ..Default::default()
            },
            Arc::new(RecordingStorage::default()),
        );
        let result = collector
            .collect_event("home_team_name", OperationType::Resolution, None, |_| {})
            .await;
        assert!(matches!(result, Err(TelemetryError::Disabled)));
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_event() {
        let collector = TelemetryCollector::new(
            TelemetryConfig {
                buffer_capacity: 2,
                ..Default::default()
            },
            Arc::new(RecordingStorage::default()),
        );
        for i in 0..3 {
            collector
                .collect_event(
                    "home_team_name",
                    OperationType::Resolution,
                    Some(format!("corr-{i}")),
                    |_| {},
                )
                .await
                .unwrap();
        }
        assert_eq!(collector.buffer_overflows().await, 1);
        let batch = collector.drain_batch().await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].correlation_id, "corr-1");
    }

    #[tokio::test]
    async fn reaching_batch_size_drains_before_flush_interval() {
        let storage = Arc::new(RecordingStorage::default());
        let collector = TelemetryCollector::new(
            TelemetryConfig {
                batch_min: 3,
                batch_max: 3,
                flush_interval: Duration::from_secs(60),
                ..Default::default()
            },
            storage.clone(),
        );
        let handle = collector.clone().spawn_drain_task();
        for i in 0..3 {
            collector
                .collect_event(
                    "home_team_name",
                    OperationType::Resolution,
                    Some(format!("corr-{i}")),
                    |_| {},
                )
                .await
                .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while storage.stored.load(Ordering::Relaxed) < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("drain task should wake on reaching batch size, not wait for flush_interval");
        handle.abort();
    }

    #[tokio::test]
    async fn invalid_event_is_rejected_before_enqueue() {
        let collector = TelemetryCollector::new(TelemetryConfig::default(), Arc::new(RecordingStorage::default()));
        let result = collector
            .collect_event("", OperationType::Resolution, None, |_| {})
            .await;
        assert!(matches!(result, Err(TelemetryError::InvalidEvent(_))));
    }
}
