//! Core data model.
//!
//! An event is one structured record submitted by a producer: either a log
//! line or a metric sample. Requests are the producer-facing shape that
//! validates into an event.

pub mod event;
pub mod request;

pub use event::{Event, EventId, EventPayload, EventType};
pub use request::{EventBody, EventRequest};
