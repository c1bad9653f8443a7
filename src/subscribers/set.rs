//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - `flush()` returns once every subscriber has handled everything emitted before it.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow (events are dropped for that
//!   subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use crate::core::panic_message;
use crate::events::Event;

use super::Subscribe;

enum Delivery {
    Event(Arc<Event>),
    Flush(oneshot::Sender<()>),
}

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Delivery>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
///
/// A worker task ends once the set (and with it the queue sender) is dropped.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Delivery>(cap);

            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    match msg {
                        Delivery::Event(ev) => {
                            let fut = sub.on_event(ev.as_ref());
                            let caught = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
                            if let Err(panic) = caught {
                                error!(
                                    subscriber = sub.name(),
                                    panic = %panic_message(panic.as_ref()),
                                    "subscriber panicked"
                                );
                            }
                        }
                        Delivery::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
        }

        Self { channels }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or **closed**, the event is dropped for it
    /// and a warning is logged with the subscriber's name.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Delivery::Event(Arc::clone(&ev))) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, "event dropped: worker closed");
                }
            }
        }
    }

    /// Waits until every subscriber has processed the events emitted so far.
    pub async fn flush(&self) {
        for channel in &self.channels {
            let (done, wait) = oneshot::channel();
            if channel.sender.send(Delivery::Flush(done)).await.is_ok() {
                let _ = wait.await;
            }
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}
