//! # Event bus: the supervisor's single observation point.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Every worker's
//! event channel is drained by a per-unit monitor that republishes into the
//! bus, and the supervisor publishes its own pool and shutdown events here.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Consumers:
//!   unit monitor A ──┐
//!   unit monitor B ──┼──► Bus ──┬──► subscriber listener ──► SubscriberSet
//!   Supervisor     ──┘          └──► Supervisor::subscribe() receivers
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)`.
//! - **No persistence**: events are lost if there are no receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
