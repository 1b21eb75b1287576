//! Metric instrument factories for eventq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"eventq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for eventq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("eventq")
}

/// Counter: events that reached a terminal outcome.
/// Labels: `status` ("success" | "failed" | "skipped"), `event_type`.
pub fn events_processed() -> Counter<u64> {
    meter()
        .u64_counter("eventq.events.processed")
        .with_description("Number of events by processing status")
        .build()
}

/// Counter: events that finished processing, successfully or not.
pub fn events_processed_total() -> Counter<u64> {
    meter()
        .u64_counter("eventq.events.processed_total")
        .with_description("Total number of processed events")
        .build()
}

/// Counter: retry attempts.
/// Labels: `event_type`.
pub fn event_retries() -> Counter<u64> {
    meter()
        .u64_counter("eventq.events.retries")
        .with_description("Number of event processing retries")
        .build()
}

/// Histogram: time to process an event, in seconds.
/// Labels: `event_type`.
pub fn event_processing_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("eventq.events.processing_duration")
        .with_description("Time spent processing an event")
        .with_unit("s")
        .build()
}

/// Histogram: time an event waited in the queue, in seconds.
/// Labels: `event_type`.
pub fn event_queue_wait() -> Histogram<f64> {
    meter()
        .f64_histogram("eventq.events.queue_wait")
        .with_description("Time from enqueue to the start of processing")
        .with_unit("s")
        .build()
}

/// Counter: events rejected at admission because the queue was full.
/// Labels: `event_type`.
pub fn queue_rejected() -> Counter<u64> {
    meter()
        .u64_counter("eventq.queue.rejected")
        .with_description("Number of events rejected by a full queue")
        .build()
}
