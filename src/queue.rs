//! Bounded in-memory event queue with admission control.
//!
//! The queue is a fixed-capacity FIFO backed by a bounded tokio channel.
//! Admission never blocks: a full queue rejects with [`Error::QueueFull`].
//! The channel itself enforces the capacity, so concurrent producers can
//! never push occupancy past it even when the fast-path size check races a
//! concurrent dequeue.

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Event;

/// Point-in-time snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue_size: usize,
    pub capacity: usize,
}

/// Fixed-capacity FIFO of events.
pub struct EventQueue {
    capacity: usize,
    tx: mpsc::Sender<Event>,
    rx: Mutex<mpsc::Receiver<Event>>,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config(
                "queue capacity must be a positive integer".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            capacity,
            tx,
            rx: Mutex::new(rx),
        })
    }

    /// Admit an event at the tail of the queue.
    ///
    /// Stamps the admission time on success. Returns [`Error::QueueFull`]
    /// when the queue holds `capacity` events.
    pub fn enqueue(&self, mut event: Event) -> Result<()> {
        if self.size() >= self.capacity {
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }

        let id = event.id();
        event.mark_enqueued(Utc::now());

        // The channel is the authoritative capacity check. The receiver lives
        // inside `self`, so the channel cannot be closed while we hold `&self`.
        self.tx.try_send(event).map_err(|_| Error::QueueFull {
            capacity: self.capacity,
        })?;

        debug!(event_id = %id, queue_size = self.size(), "event enqueued");
        Ok(())
    }

    /// Wait for the head event.
    ///
    /// Returns `None` once `cancel` fires, without consuming an event.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<Event> {
        if cancel.is_cancelled() {
            return None;
        }

        let mut rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            event = rx.recv() => event,
        }
    }

    /// Take the head event if one is ready.
    ///
    /// Returns `None` when the queue is empty or another consumer is
    /// currently waiting in [`dequeue`](Self::dequeue).
    pub fn try_dequeue(&self) -> Option<Event> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Current occupancy. Racy with concurrent mutation; for monitoring only.
    pub fn size(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queue_size: self.size(),
            capacity: self.capacity,
        }
    }
}
