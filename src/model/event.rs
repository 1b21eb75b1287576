//! Event entity.
//!
//! An event is immutable after construction with two exceptions: the
//! admission timestamp (stamped once by the queue) and the advisory thread
//! id (stamped once by whichever processor handles it). Both setters ignore
//! any second call; only the queue may stamp admission.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Caller-supplied event identifier. Propagated, never generated or checked
/// for uniqueness by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Event variant tag, used as a label for metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Log,
    Metric,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Log => "log",
            EventType::Metric => "metric",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(EventType::Log),
            "metric" => Ok(EventType::Metric),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// Type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    Log { level: String, message: String },
    Metric { value: f64 },
}

/// A single event flowing through the queue and worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    created_at: DateTime<Utc>,
    enqueued_at: Option<DateTime<Utc>>,
    thread_id: Option<String>,
    #[serde(flatten)]
    payload: EventPayload,
}

impl Event {
    pub fn new(id: impl Into<EventId>, payload: EventPayload) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            enqueued_at: None,
            thread_id: None,
            payload,
        }
    }

    /// Build a log event.
    pub fn log(id: impl Into<EventId>, level: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            id,
            EventPayload::Log {
                level: level.into(),
                message: message.into(),
            },
        )
    }

    /// Build a metric event.
    pub fn metric(id: impl Into<EventId>, value: f64) -> Self {
        Self::new(id, EventPayload::Metric { value })
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        match self.payload {
            EventPayload::Log { .. } => EventType::Log,
            EventPayload::Metric { .. } => EventType::Metric,
        }
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the event was admitted into the queue. `None` before admission.
    pub fn enqueued_at(&self) -> Option<DateTime<Utc>> {
        self.enqueued_at
    }

    /// Identifier of the worker thread that processed the event.
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Time spent waiting in the queue, measured up to `now`.
    pub fn queue_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.enqueued_at
            .map(|at| (now - at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Key/value view of the event used for digesting.
    ///
    /// Keys are ordered so the serialized form is canonical. The advisory
    /// thread id is left out: it changes nothing about the event itself.
    pub fn metadata(&self) -> BTreeMap<String, Value> {
        let mut meta = BTreeMap::new();
        meta.insert("event_id".to_string(), Value::String(self.id.to_string()));
        meta.insert(
            "event_type".to_string(),
            Value::String(self.event_type().as_str().to_string()),
        );
        meta.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        meta.insert(
            "enqueued_at".to_string(),
            self.enqueued_at
                .map(|at| Value::String(at.to_rfc3339()))
                .unwrap_or(Value::Null),
        );
        match &self.payload {
            EventPayload::Log { level, message } => {
                meta.insert("level".to_string(), Value::String(level.clone()));
                meta.insert("message".to_string(), Value::String(message.clone()));
            }
            EventPayload::Metric { value } => {
                meta.insert("value".to_string(), Value::from(*value));
            }
        }
        meta
    }

    pub(crate) fn mark_enqueued(&mut self, at: DateTime<Utc>) {
        if self.enqueued_at.is_none() {
            self.enqueued_at = Some(at);
        }
    }

    /// Record which worker thread processed the event. Only the first call
    /// takes effect, so a retry keeps the original value.
    pub fn assign_thread(&mut self, thread_id: impl Into<String>) {
        if self.thread_id.is_none() {
            self.thread_id = Some(thread_id.into());
        }
    }
}
