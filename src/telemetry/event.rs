//! Event processing span helpers.
//!
//! Provides span creation and attempt/outcome recording for events flowing
//! through the worker pool.

use tracing::Span;

use crate::model::{EventId, EventType};
use crate::report::Outcome;

/// Start a span for processing one event.
///
/// The `event.attempt` and `event.outcome` fields are declared empty and
/// are filled via [`record_attempt`] and [`record_outcome`].
pub fn start_event_span(event_type: EventType, event_id: EventId) -> Span {
    tracing::info_span!(
        "event.process",
        "event.type" = event_type.as_str(),
        "event.id" = %event_id,
        "event.attempt" = tracing::field::Empty,
        "event.outcome" = tracing::field::Empty,
    )
}

/// Record which attempt (1 or 2) is running.
pub fn record_attempt(span: &Span, attempt: u32) {
    span.record("event.attempt", attempt);
}

/// Record the terminal outcome on the span.
pub fn record_outcome(span: &Span, outcome: Outcome) {
    span.record("event.outcome", outcome.as_str());
}
