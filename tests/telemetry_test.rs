//! Integration tests for telemetry initialization, span helpers and the
//! metrics reporter.

use std::time::Duration;

use eventq::model::{EventId, EventType};
use eventq::report::{MetricsReporter, NoopReporter, Outcome, OutcomeReporter};
use eventq::telemetry::event::{record_attempt, record_outcome, start_event_span};
use eventq::telemetry::{TelemetryConfig, init_telemetry, metrics};
use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so this is the
    // only test that installs one.
    let guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "eventq-test".to_string(),
        log_level: "debug".to_string(),
    })
    .unwrap();
    assert!(!guard.is_exporting());
    guard.force_flush();
}

#[test]
fn invalid_log_level_is_a_config_error() {
    // RUST_LOG takes precedence over the configured level.
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    // Directive parsing fails before any subscriber is installed.
    let result = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "eventq-test".to_string(),
        log_level: "info,eventq=loud".to_string(),
    });
    assert!(matches!(result, Err(eventq::error::Error::Config(_))));
}

#[test]
fn event_span_records_attempt_and_outcome() {
    let span = start_event_span(EventType::Metric, EventId(Uuid::new_v4()));
    record_attempt(&span, 1);
    record_attempt(&span, 2);
    record_outcome(&span, Outcome::Failed);
}

#[test]
fn metrics_reporter_records_on_the_global_meter() {
    let reporter = MetricsReporter::new();
    reporter.record_queue_wait(EventType::Log, Duration::from_millis(3));
    reporter.record_retry(EventType::Log);
    reporter.record_outcome(EventType::Log, Outcome::Success, Duration::from_millis(120));
    reporter.record_outcome(EventType::Metric, Outcome::Skipped, Duration::ZERO);

    metrics::queue_rejected().add(1, &[]);
}

#[test]
fn outcome_labels() {
    assert_eq!(Outcome::Success.to_string(), "success");
    assert_eq!(Outcome::Failed.as_str(), "failed");
    assert_eq!(Outcome::Skipped.as_str(), "skipped");

    NoopReporter.record_outcome(EventType::Metric, Outcome::Failed, Duration::ZERO);
}
