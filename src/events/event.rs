//! # Runtime events observed by the supervisor.
//!
//! The [`EventKind`] enum classifies events in three groups:
//! - **Worker events**: forwarded from a worker's event channel (started,
//!   poll result, poll failure, protocol violation, cleaned up, stopped)
//! - **Pool events**: registry changes made by the supervisor (spawned,
//!   replaced, resolve failure, abnormal exit)
//! - **Shutdown events**: the two-phase shutdown (requested, all stopped,
//!   grace exceeded, forced termination)
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Events of one worker are forwarded in the order the worker
//! emitted them; events of different workers interleave arbitrarily.
//!
//! ## Example
//! ```rust
//! use pollvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PollFailed)
//!     .with_worker("PollerA")
//!     .with_error("PollerA failed!")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::PollFailed);
//! assert_eq!(ev.worker.as_deref(), Some("PollerA"));
//! assert_eq!(ev.error.as_deref(), Some("PollerA failed!"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::protocol::WorkerEvent;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker events ===
    /// Worker accepted `start` and began polling.
    ///
    /// Sets: `worker`
    Started,

    /// A poll succeeded.
    ///
    /// Sets: `worker`, `tag` (e.g. `FAKE_API_RESULT`), `data`
    PollResult,

    /// A poll failed and the loop backed off.
    ///
    /// Sets: `worker`, `error`, `attempt`, `delay_ms`
    PollFailed,

    /// Worker rejected a command (e.g. a second `start`).
    ///
    /// Sets: `worker`, `error`
    ProtocolViolation,

    /// Worker finished cleanup.
    ///
    /// Sets: `worker`
    CleanedUp,

    /// Worker stopped cleanly; nothing else follows for this unit.
    ///
    /// Sets: `worker`
    Stopped,

    // === Pool events ===
    /// Worker unit created, registered and sent `start`.
    ///
    /// Sets: `worker`, `tag` (strategy kind)
    WorkerSpawned,

    /// A spawn reused a registered name; the previous unit was detached.
    ///
    /// Sets: `worker`
    WorkerReplaced,

    /// A poller could not be resolved to a strategy and was skipped.
    ///
    /// Sets: `worker`, `tag` (requested kind), `error`
    ResolveFailed,

    /// Worker unit exited abnormally (panic outside the task boundary).
    ///
    /// Sets: `worker`, `error`
    WorkerDead,

    // === Shutdown events ===
    /// Shutdown requested.
    ///
    /// Sets: `reason`
    ShutdownRequested,

    /// Every worker exited within the grace window.
    AllStoppedWithin,

    /// Grace window elapsed with workers still registered.
    ///
    /// Sets: `reason` (comma-separated names)
    GraceExceeded,

    /// Worker unit was force-terminated after the grace window.
    ///
    /// Sets: `worker`
    WorkerTerminated,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker name, if applicable.
    pub worker: Option<Arc<str>>,
    /// Result tag or strategy kind.
    pub tag: Option<Arc<str>>,
    /// Poll result payload.
    pub data: Option<Value>,
    /// Failure message.
    pub error: Option<Arc<str>>,
    /// Human-readable reason (shutdown trigger, stuck workers).
    pub reason: Option<Arc<str>>,
    /// Consecutive failure count (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next poll in milliseconds.
    pub delay_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            tag: None,
            data: None,
            error: None,
            reason: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a result tag or strategy kind.
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Attaches a result payload.
    #[inline]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches a failure message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a failure count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the scheduled delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Returns the delay as a `Duration`, if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    /// True for events that end a worker's unit (clean or not).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Stopped | EventKind::WorkerDead | EventKind::WorkerTerminated
        )
    }
}

impl From<WorkerEvent> for Event {
    fn from(ev: WorkerEvent) -> Self {
        match ev {
            WorkerEvent::Started { name } => Event::new(EventKind::Started).with_worker(name),
            WorkerEvent::Result { name, tag, data } => Event::new(EventKind::PollResult)
                .with_worker(name)
                .with_tag(tag)
                .with_data(data),
            WorkerEvent::Error {
                name,
                error,
                attempt,
                delay_ms,
            } => Event::new(EventKind::PollFailed)
                .with_worker(name)
                .with_error(error)
                .with_attempt(attempt)
                .with_delay(Duration::from_millis(delay_ms)),
            WorkerEvent::ProtocolViolation { name, detail } => {
                Event::new(EventKind::ProtocolViolation)
                    .with_worker(name)
                    .with_error(detail)
            }
            WorkerEvent::CleanedUp { name } => Event::new(EventKind::CleanedUp).with_worker(name),
            WorkerEvent::Stopped { name } => Event::new(EventKind::Stopped).with_worker(name),
        }
    }
}
