//! Producer-facing create-event request and its validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::event::{Event, EventType};

/// Top-level request envelope: `{"event": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventRequest {
    pub event: EventBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventBody {
    pub event_type: String,
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EventRequest {
    /// Request for a log event.
    pub fn log(event_id: impl Into<String>, level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event: EventBody {
                event_type: EventType::Log.as_str().to_string(),
                event_id: event_id.into(),
                level: Some(level.into()),
                message: Some(message.into()),
                ..Default::default()
            },
        }
    }

    /// Request for a metric event.
    pub fn metric(event_id: impl Into<String>, value: f64) -> Self {
        Self {
            event: EventBody {
                event_type: EventType::Metric.as_str().to_string(),
                event_id: event_id.into(),
                value: Some(value),
                ..Default::default()
            },
        }
    }

    /// Parse one JSON document into a request.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Validate the request and build the event it describes.
    ///
    /// Field problems are collected rather than reported one at a time.
    pub fn into_event(self) -> Result<Event> {
        let body = self.event;
        let mut errors = BTreeMap::new();

        let id = match Uuid::parse_str(&body.event_id) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.insert("event_id".to_string(), "should be a valid uuid".to_string());
                None
            }
        };

        let event_type = if body.event_type.is_empty() {
            errors.insert("event_type".to_string(), "shouldn't be empty".to_string());
            None
        } else {
            match body.event_type.parse::<EventType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    errors.insert("event_type".to_string(), "invalid".to_string());
                    None
                }
            }
        };

        match event_type {
            Some(EventType::Log) => {
                if body.value.is_some() {
                    errors.insert("value".to_string(), "not allowed for log events".to_string());
                }
                if body.level.is_none() {
                    errors.insert("level".to_string(), "shouldn't be nil".to_string());
                }
                if body.message.is_none() {
                    errors.insert("message".to_string(), "shouldn't be nil".to_string());
                }
            }
            Some(EventType::Metric) => {
                if body.level.is_some() {
                    errors.insert("level".to_string(), "not allowed for metric events".to_string());
                }
                if body.message.is_some() {
                    errors.insert(
                        "message".to_string(),
                        "not allowed for metric events".to_string(),
                    );
                }
                if body.value.is_none() {
                    errors.insert("value".to_string(), "shouldn't be nil".to_string());
                }
            }
            None => {}
        }

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        // Both are present once no errors were recorded.
        let (Some(id), Some(event_type)) = (id, event_type) else {
            return Err(Error::Other("event request validation is inconsistent".to_string()));
        };

        let event = match event_type {
            EventType::Log => Event::log(
                id,
                body.level.unwrap_or_default(),
                body.message.unwrap_or_default(),
            ),
            EventType::Metric => Event::metric(id, body.value.unwrap_or_default()),
        };
        Ok(event)
    }
}
