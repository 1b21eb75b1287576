//! # eventq
//!
//! Admission-controlled bounded event queue with a concurrency-limited,
//! retry-aware worker pool.
//!
//! Producers [`enqueue`](queue::EventQueue::enqueue) log and metric events;
//! a [`WorkerPool`](engine::WorkerPool) drains the queue, runs each event
//! through an [`EventProcessor`](pipeline::EventProcessor) with at most one
//! retry, and reports outcomes through an
//! [`OutcomeReporter`](report::OutcomeReporter).

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod telemetry;
