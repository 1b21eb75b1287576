//! Error types for eventq.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::engine::PoolState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("event queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("graceful shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    #[error("invalid pool state transition: {from} -> {to}")]
    InvalidTransition { from: PoolState, to: PoolState },

    #[error("invalid event: {}", format_fields(.0))]
    Validation(BTreeMap<String, String>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure of a single processing attempt. Contained within the worker task.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to persist processing result: {0}")]
    Persist(#[source] std::io::Error),

    #[error("processor panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

fn format_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, msg)| format!("{field} {msg}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
