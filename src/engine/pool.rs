//! Worker pool: pulls events off the queue and processes them with bounded
//! concurrency and a single retry.
//!
//! Events are dequeued in FIFO order, but tasks run concurrently, so the
//! order in which events finish (and are persisted) is not guaranteed to
//! match admission order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt as _;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

use super::shutdown::ShutdownCoordinator;
use crate::error::{Error, ProcessingError, Result};
use crate::model::Event;
use crate::pipeline::{EventProcessor, ProcessingOutcome};
use crate::queue::EventQueue;
use crate::report::{Outcome, OutcomeReporter};
use crate::telemetry::event::{record_attempt, record_outcome, start_event_span};

/// Default number of events processed at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
/// Default wait between a failed attempt and its retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of events processed simultaneously.
    pub concurrency_limit: usize,
    /// Wait between a failed first attempt and the retry.
    pub retry_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Lifecycle of a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// Built, `run` not yet called.
    Created,
    /// Dispatch loop active.
    Running,
    /// Cancelled; in-flight tasks draining.
    ShuttingDown,
    /// Drained, or gave up waiting. Terminal.
    Stopped,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolState::Created,
            1 => PoolState::Running,
            2 => PoolState::ShuttingDown,
            _ => PoolState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PoolState::Created => 0,
            PoolState::Running => 1,
            PoolState::ShuttingDown => 2,
            PoolState::Stopped => 3,
        }
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::ShuttingDown => "shutting_down",
            PoolState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Concurrency-limited consumer of an [`EventQueue`].
pub struct WorkerPool {
    queue: Arc<EventQueue>,
    processor: Arc<dyn EventProcessor>,
    reporter: Arc<dyn OutcomeReporter>,
    config: PoolConfig,
    limiter: Arc<Semaphore>,
    shutdown: ShutdownCoordinator,
    state: Arc<AtomicU8>,
    pending: Arc<AtomicUsize>,
}

impl Clone for WorkerPool {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            processor: Arc::clone(&self.processor),
            reporter: Arc::clone(&self.reporter),
            config: self.config.clone(),
            limiter: Arc::clone(&self.limiter),
            shutdown: self.shutdown.clone(),
            state: Arc::clone(&self.state),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl WorkerPool {
    pub fn new(
        queue: Arc<EventQueue>,
        processor: Arc<dyn EventProcessor>,
        reporter: Arc<dyn OutcomeReporter>,
        config: PoolConfig,
    ) -> Result<Self> {
        Self::with_coordinator(queue, processor, reporter, config, ShutdownCoordinator::new())
    }

    /// Build a pool around an existing coordinator, e.g. one derived from a
    /// process-wide cancellation token.
    pub fn with_coordinator(
        queue: Arc<EventQueue>,
        processor: Arc<dyn EventProcessor>,
        reporter: Arc<dyn OutcomeReporter>,
        config: PoolConfig,
        shutdown: ShutdownCoordinator,
    ) -> Result<Self> {
        if config.concurrency_limit == 0 {
            return Err(Error::Config(
                "worker concurrency limit must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            limiter: Arc::new(Semaphore::new(config.concurrency_limit)),
            queue,
            processor,
            reporter,
            config,
            shutdown,
            state: Arc::new(AtomicU8::new(PoolState::Created.as_u8())),
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn concurrency_limit(&self) -> usize {
        self.config.concurrency_limit
    }

    /// Tasks currently holding a concurrency slot.
    pub fn active_tasks(&self) -> usize {
        self.config.concurrency_limit - self.limiter.available_permits()
    }

    /// Events taken off the queue that have not reached an outcome yet,
    /// including one the dispatch loop holds while waiting for a slot.
    pub fn pending_events(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Nothing buffered and nothing taken off the queue left to finish.
    ///
    /// The loop counts an event right after the channel hands it over, so a
    /// caller polling for a drain should see idle on two consecutive checks.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.pending_events() == 0
    }

    /// Tasks (and the dispatch loop) that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.shutdown.in_flight()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        self.shutdown.token()
    }

    fn transition(&self, from: PoolState, to: PoolState) -> Result<()> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|current| Error::InvalidTransition {
                from: PoolState::from_u8(current),
                to,
            })
    }

    /// Run [`run`](Self::run) on a new tokio task.
    pub fn spawn(&self) -> JoinHandle<Result<()>> {
        let pool = self.clone();
        tokio::spawn(async move { pool.run().await })
    }

    /// Run the dispatch loop until cancellation.
    ///
    /// Each dequeued event waits for a free concurrency slot and is then
    /// processed on its own task; the loop does not wait for that task.
    pub async fn run(&self) -> Result<()> {
        self.transition(PoolState::Created, PoolState::Running)?;

        // The loop counts toward the completion barrier like any task.
        let _loop_token = self.shutdown.tracker().token();
        let cancel = self.shutdown.token().clone();

        info!(
            concurrency_limit = self.config.concurrency_limit,
            queue_capacity = self.queue.capacity(),
            "worker pool started"
        );

        while let Some(event) = self.queue.dequeue(&cancel).await {
            let pending = PendingEvent::new(&self.pending);
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&self.limiter).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                warn!(
                    event_id = %event.id(),
                    "shutdown requested while waiting for a worker slot, skipping event"
                );
                self.reporter
                    .record_outcome(event.event_type(), Outcome::Skipped, Duration::ZERO);
                break;
            };

            let task = EventTask {
                processor: Arc::clone(&self.processor),
                reporter: Arc::clone(&self.reporter),
                cancel: cancel.clone(),
                retry_backoff: self.config.retry_backoff,
            };
            let span = start_event_span(event.event_type(), event.id());

            self.shutdown.tracker().spawn(
                async move {
                    let _permit = permit;
                    let _pending = pending;
                    task.run(event).await;
                }
                .instrument(span),
            );
        }

        // `shutdown` may already have moved the state along.
        let _ = self.transition(PoolState::Running, PoolState::ShuttingDown);
        info!("worker run loop exiting due to cancellation");
        Ok(())
    }

    /// Stop dispatching and wait up to `deadline` for in-flight tasks.
    ///
    /// Returns [`Error::ShutdownTimeout`] if tasks are still running at the
    /// deadline; they are left to finish on their own.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        info!(in_flight = self.in_flight(), "initiating worker pool shutdown");
        let _ = self.transition(PoolState::Running, PoolState::ShuttingDown);

        let result = self.shutdown.shutdown(deadline).await;
        self.state.store(PoolState::Stopped.as_u8(), Ordering::Release);

        match &result {
            Ok(()) => info!("worker pool shutdown completed successfully"),
            Err(_) => warn!(
                in_flight = self.in_flight(),
                deadline_ms = deadline.as_millis() as u64,
                "worker pool graceful shutdown timed out"
            ),
        }
        result
    }
}

/// Counts one dequeued event until dropped, on whichever path it leaves by.
struct PendingEvent(Arc<AtomicUsize>);

impl PendingEvent {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingEvent {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Everything a processing task needs, detached from the pool.
struct EventTask {
    processor: Arc<dyn EventProcessor>,
    reporter: Arc<dyn OutcomeReporter>,
    cancel: CancellationToken,
    retry_backoff: Duration,
}

impl EventTask {
    async fn run(self, mut event: Event) {
        let span = Span::current();
        let event_type = event.event_type();
        let event_id = event.id();

        if let Some(wait) = event.queue_wait(Utc::now()) {
            self.reporter.record_queue_wait(event_type, wait);
        }

        let started = Instant::now();
        info!(event_id = %event_id, "worker started processing the event");

        record_attempt(&span, 1);
        let outcome = match self.attempt(&mut event).await {
            Ok(_) => Outcome::Success,
            Err(e) => {
                error!(event_id = %event_id, error = %e, "event processing failed");

                tokio::select! {
                    _ = tokio::time::sleep(self.retry_backoff) => {}
                    _ = self.cancel.cancelled() => {}
                }

                if self.cancel.is_cancelled() {
                    info!(event_id = %event_id, "skipping retry due to shutdown");
                    Outcome::Skipped
                } else {
                    self.reporter.record_retry(event_type);
                    record_attempt(&span, 2);
                    match self.attempt(&mut event).await {
                        Ok(_) => Outcome::Success,
                        Err(e) => {
                            error!(
                                event_id = %event_id,
                                error = %e,
                                "event processing failed permanently"
                            );
                            Outcome::Failed
                        }
                    }
                }
            }
        };

        record_outcome(&span, outcome);
        if outcome == Outcome::Success {
            info!(event_id = %event_id, "finished processing of the event");
        }
        self.reporter
            .record_outcome(event_type, outcome, started.elapsed());
    }

    /// One call into the processor. A panic is contained here and counts as
    /// a failed attempt.
    async fn attempt(
        &self,
        event: &mut Event,
    ) -> std::result::Result<ProcessingOutcome, ProcessingError> {
        match AssertUnwindSafe(self.processor.process(event))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ProcessingError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
