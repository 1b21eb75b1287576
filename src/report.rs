//! Outcome reporting for processed events.
//!
//! The worker pool calls an [`OutcomeReporter`] for every terminal outcome,
//! every retry and every queue-wait observation. What happens with those
//! observations is up to the implementation; [`NoopReporter`] discards them.

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};
use serde::{Deserialize, Serialize};

use crate::model::EventType;
use crate::telemetry::metrics;

/// Terminal classification of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Processed and persisted, possibly after one retry.
    Success,
    /// Both attempts failed.
    Failed,
    /// Abandoned because shutdown was requested.
    Skipped,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for per-event observations.
pub trait OutcomeReporter: Send + Sync {
    fn record_outcome(&self, event_type: EventType, outcome: Outcome, duration: Duration);

    fn record_queue_wait(&self, event_type: EventType, wait: Duration);

    fn record_retry(&self, event_type: EventType);
}

/// Discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl OutcomeReporter for NoopReporter {
    fn record_outcome(&self, _: EventType, _: Outcome, _: Duration) {}

    fn record_queue_wait(&self, _: EventType, _: Duration) {}

    fn record_retry(&self, _: EventType) {}
}

/// Records observations on OpenTelemetry instruments.
pub struct MetricsReporter {
    processed: Counter<u64>,
    processed_total: Counter<u64>,
    retries: Counter<u64>,
    processing_duration: Histogram<f64>,
    queue_wait: Histogram<f64>,
}

impl MetricsReporter {
    pub fn new() -> Self {
        Self {
            processed: metrics::events_processed(),
            processed_total: metrics::events_processed_total(),
            retries: metrics::event_retries(),
            processing_duration: metrics::event_processing_duration(),
            queue_wait: metrics::event_queue_wait(),
        }
    }
}

impl Default for MetricsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeReporter for MetricsReporter {
    fn record_outcome(&self, event_type: EventType, outcome: Outcome, duration: Duration) {
        self.processed.add(
            1,
            &[
                KeyValue::new("status", outcome.as_str()),
                KeyValue::new("event_type", event_type.as_str()),
            ],
        );
        // Skipped events never finished processing.
        if outcome != Outcome::Skipped {
            self.processed_total.add(1, &[]);
        }
        if outcome == Outcome::Success {
            self.processing_duration.record(
                duration.as_secs_f64(),
                &[KeyValue::new("event_type", event_type.as_str())],
            );
        }
    }

    fn record_queue_wait(&self, event_type: EventType, wait: Duration) {
        self.queue_wait.record(
            wait.as_secs_f64(),
            &[KeyValue::new("event_type", event_type.as_str())],
        );
    }

    fn record_retry(&self, event_type: EventType) {
        self.retries
            .add(1, &[KeyValue::new("event_type", event_type.as_str())]);
    }
}
