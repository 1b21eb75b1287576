//! Validation of producer-facing event requests.

use eventq::error::{Error, Result};
use eventq::model::{Event, EventPayload, EventRequest, EventType};
use uuid::Uuid;

fn field_errors(result: Result<Event>) -> Vec<(String, String)> {
    match result {
        Err(Error::Validation(fields)) => fields.into_iter().collect(),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn valid_log_request_builds_a_log_event() {
    let id = Uuid::new_v4();
    let event = EventRequest::log(id.to_string(), "info", "service started")
        .into_event()
        .unwrap();

    assert_eq!(event.id().0, id);
    assert_eq!(event.event_type(), EventType::Log);
    assert_eq!(
        event.payload(),
        &EventPayload::Log {
            level: "info".into(),
            message: "service started".into(),
        }
    );
    assert!(event.enqueued_at().is_none());
    assert!(event.thread_id().is_none());
}

#[test]
fn valid_metric_request_parses_from_json() {
    let id = Uuid::new_v4();
    let json = format!(r#"{{"event":{{"event_type":"metric","event_id":"{id}","value":12.5}}}}"#);

    let event = EventRequest::from_json(&json).unwrap().into_event().unwrap();
    assert_eq!(event.event_type(), EventType::Metric);
    assert_eq!(event.payload(), &EventPayload::Metric { value: 12.5 });
}

#[test]
fn bad_uuid_is_reported() {
    let errors = field_errors(EventRequest::log("not-a-uuid", "info", "x").into_event());
    assert_eq!(
        errors,
        vec![("event_id".to_string(), "should be a valid uuid".to_string())]
    );
}

#[test]
fn empty_and_unknown_types_are_reported() {
    let mut request = EventRequest::metric(Uuid::new_v4().to_string(), 1.0);
    request.event.event_type = String::new();
    assert_eq!(
        field_errors(request.into_event()),
        vec![("event_type".to_string(), "shouldn't be empty".to_string())]
    );

    let mut request = EventRequest::metric(Uuid::new_v4().to_string(), 1.0);
    request.event.event_type = "trace".to_string();
    assert_eq!(
        field_errors(request.into_event()),
        vec![("event_type".to_string(), "invalid".to_string())]
    );
}

#[test]
fn log_request_needs_level_and_message_but_no_value() {
    let mut request = EventRequest::log(Uuid::new_v4().to_string(), "info", "x");
    request.event.level = None;
    request.event.message = None;
    request.event.value = Some(1.0);

    let errors = field_errors(request.into_event());
    assert_eq!(
        errors,
        vec![
            ("level".to_string(), "shouldn't be nil".to_string()),
            ("message".to_string(), "shouldn't be nil".to_string()),
            ("value".to_string(), "not allowed for log events".to_string()),
        ]
    );
}

#[test]
fn metric_request_needs_value_but_no_log_fields() {
    let mut request = EventRequest::metric(Uuid::new_v4().to_string(), 1.0);
    request.event.value = None;
    request.event.level = Some("info".to_string());

    let errors = field_errors(request.into_event());
    assert_eq!(
        errors,
        vec![
            ("level".to_string(), "not allowed for metric events".to_string()),
            ("value".to_string(), "shouldn't be nil".to_string()),
        ]
    );
}

#[test]
fn every_problem_is_collected_at_once() {
    let mut request = EventRequest::log("nope", "info", "x");
    request.event.message = None;

    let err = request.into_event().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("event_id should be a valid uuid"), "{text}");
    assert!(text.contains("message shouldn't be nil"), "{text}");
}

#[test]
fn unknown_fields_are_rejected() {
    let id = Uuid::new_v4();
    let json = format!(
        r#"{{"event":{{"event_type":"metric","event_id":"{id}","value":1,"unit":"ms"}}}}"#
    );
    assert!(matches!(EventRequest::from_json(&json), Err(Error::Json(_))));

    let json = format!(r#"{{"event":{{"event_type":"metric","event_id":"{id}","value":1}},"x":1}}"#);
    assert!(matches!(EventRequest::from_json(&json), Err(Error::Json(_))));
}

#[test]
fn malformed_json_is_rejected() {
    assert!(matches!(EventRequest::from_json("{"), Err(Error::Json(_))));
    assert!(matches!(EventRequest::from_json(r#"{"event":{}}"#), Err(Error::Json(_))));
}

#[test]
fn event_serializes_with_flat_payload() {
    let event = Event::log(Uuid::nil(), "debug", "hello");
    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(value["id"], Uuid::nil().to_string());
    assert_eq!(value["event_type"], "log");
    assert_eq!(value["level"], "debug");
    assert_eq!(value["message"], "hello");
    assert!(value["enqueued_at"].is_null());
    assert!(value["thread_id"].is_null());

    let back: Event = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
}
