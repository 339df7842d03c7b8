//! # Event Forwarding
//!
//! Lock-free hand-off of workshop events to the presentation thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ drain  ┌─────────────┐ send  ┌─────────────┐ drain ┌──────────────┐
//! │  Workshop   │───────>│ GameSession │──────>│  EventBus   │──────>│ Presentation │
//! │ (queue)     │        │ (tick loop) │       │ (bounded)   │       │ (UI thread)  │
//! └─────────────┘        └─────────────┘       └─────────────┘       └──────────────┘
//! ```
//!
//! Events flow one way, from the simulation to whoever draws it. The channel
//! is bounded: a stalled consumer costs dropped events, never a stalled tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alembic_economy::AlchemyEvent;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Event bus between the simulation and the presentation layer.
///
/// Pre-allocates a bounded channel so memory never grows in the tick path.
pub struct EventBus {
    /// Sender end - held by the tick loop.
    sender: Sender<AlchemyEvent>,
    /// Receiver end - held by the presentation layer.
    receiver: Receiver<AlchemyEvent>,
    /// Events dropped because the channel was full, shared by all senders.
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum events in flight before new ones are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Creates a paired sender and receiver.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Handle for sending events.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<AlchemyEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Sends an event without blocking.
    ///
    /// Returns `false` if the event was dropped (channel full or no receiver).
    #[inline]
    pub fn send(&self, event: AlchemyEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(?event, dropped, "event channel full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("event receiver gone, dropping event");
                false
            }
        }
    }

    /// Sends every event in order; returns how many were delivered.
    pub fn send_all(&self, events: impl IntoIterator<Item = AlchemyEvent>) -> usize {
        let mut delivered = 0;
        for event in events {
            if self.send(event) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Events dropped so far because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle for receiving events.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<AlchemyEvent>,
}

impl EventReceiver {
    /// Receives all pending events without blocking.
    #[inline]
    pub fn drain(&self) -> Vec<AlchemyEvent> {
        let mut events = Vec::with_capacity(self.receiver.len());
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Receives one event, `None` if nothing is pending.
    #[inline]
    pub fn try_recv(&self) -> Option<AlchemyEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Checks if there are pending events.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}
