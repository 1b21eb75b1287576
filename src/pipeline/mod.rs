//! Per-event processing: digest the event metadata, simulate work, persist
//! the result.

pub mod sink;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ProcessingError;
use crate::model::Event;

pub use sink::{FileSink, MemorySink, PersistenceSink};

/// Default bounds for the simulated processing latency.
pub const DEFAULT_MIN_LATENCY: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(200);

/// Record handed to the persistence sink for one processed event.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub event: Event,
    /// Hex SHA-256 of the canonical metadata bytes.
    pub digest: String,
    /// Length of the canonical metadata bytes.
    pub length: usize,
    /// Seconds spent processing, four decimal places.
    pub processing_time: String,
    pub processed_at: DateTime<Utc>,
}

/// One processing attempt for an event.
///
/// The worker pool calls this at most twice per event. Implementations may
/// stamp the event's advisory thread id with [`Event::assign_thread`]; any
/// other mutation is off limits.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn process(&self, event: &mut Event) -> Result<ProcessingOutcome, ProcessingError>;
}

/// Digest-and-persist pipeline.
pub struct ProcessingPipeline {
    sink: Arc<dyn PersistenceSink>,
    min_latency: Duration,
    max_latency: Duration,
}

impl ProcessingPipeline {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self {
            sink,
            min_latency: DEFAULT_MIN_LATENCY,
            max_latency: DEFAULT_MAX_LATENCY,
        }
    }

    /// Override the simulated latency range. Bounds are swapped if reversed.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min.min(max);
        self.max_latency = min.max(max);
        self
    }

    fn simulated_latency(&self) -> Duration {
        rand::thread_rng().gen_range(self.min_latency..=self.max_latency)
    }
}

/// Hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl EventProcessor for ProcessingPipeline {
    async fn process(&self, event: &mut Event) -> Result<ProcessingOutcome, ProcessingError> {
        let started = Instant::now();

        let metadata = serde_json::to_vec(&event.metadata()).map_err(ProcessingError::Serialize)?;
        let digest = digest_hex(&metadata);
        let length = metadata.len();

        event.assign_thread(format!("{:?}", std::thread::current().id()));

        let latency = self.simulated_latency();
        tokio::time::sleep(latency).await;

        let outcome = ProcessingOutcome {
            event: event.clone(),
            digest,
            length,
            processing_time: format!("{:.4}", started.elapsed().as_secs_f64()),
            processed_at: Utc::now(),
        };

        let mut record = serde_json::to_vec(&outcome).map_err(ProcessingError::Serialize)?;
        record.push(b'\n');
        self.sink
            .append(&record)
            .await
            .map_err(ProcessingError::Persist)?;

        debug!(
            event_id = %outcome.event.id(),
            length,
            latency_ms = latency.as_millis() as u64,
            "event persisted"
        );
        Ok(outcome)
    }
}
