//! # pollvisor
//!
//! **Pollvisor** runs a named pool of self-healing async pollers.
//!
//! Each poller repeatedly invokes a task strategy. Successes reset it to a
//! base interval; failures stretch the interval logarithmically up to a cap.
//! Every poller lives in its own execution unit, talks to the supervisor only
//! through two channels, and is shut down in two phases: a cooperative `stop`
//! followed, after a grace window, by forced termination.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ PollerConfig │   │ PollerConfig │   │ PollerConfig │
//!     │  (PollerA)   │   │  (PollerB)   │   │  (PollerC)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Strategies (kind → TaskStrategy)                               │
//! │  - Registry (name → command sender + abort handle)                │
//! │  - Bus (broadcast events) ──► SubscriberSet (LogWriter, ...)      │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!   Start│Stop         Start│Stop         Start│Stop        (command-in)
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  PollWorker  │   │  PollWorker  │   │  PollWorker  │
//!     │  └ PollLoop  │   │  └ PollLoop  │   │  └ PollLoop  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ STARTED / <TASK>_RESULT / ERROR / CLEANED_UP / STOPPED
//!            ▼                  ▼                  ▼      (event-out)
//!        monitor ─────────────► Bus ◄───────────── monitor
//! ```
//!
//! ### Poll loop
//! ```text
//! loop {
//!   ├─► stop? → exit
//!   ├─► strategy.poll(name)
//!   │     ├─ Ok  → interval = base, attempt = 1          → RESULT
//!   │     └─ Err → interval = min(round(base·ln(attempt+1)), max),
//!   │              attempt += 1                          → ERROR
//!   └─► cancelable timer(interval)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Spawn named pollers, two-phase shutdown.                 | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Strategies**    | What a poll does, selected by kind.                      | [`TaskStrategy`], [`StrategyFn`], [`Strategies`] |
//! | **Backoff**       | Logarithmic retry delay with a cap.                      | [`BackoffPolicy`]                           |
//! | **Protocol**      | Command-in / event-out messages per worker.              | [`Command`], [`WorkerEvent`]                |
//! | **Subscriber API**| Observe every runtime event.                             | [`Subscribe`], [`LogWriter`], [`Event`]     |
//! | **Errors**        | Typed errors per concern.                                | [`TaskError`], [`RuntimeError`], [`StrategyError`], [`ConfigError`] |
//! | **Configuration** | TOML pool and poller settings.                           | [`PoolConfig`], [`PollerConfig`]            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use serde_json::json;
//! use pollvisor::{EventKind, PollerConfig, PoolConfig, StrategyFn, Strategies, Supervisor, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut strategies = Strategies::new();
//!     strategies.register_strategy(
//!         "clock",
//!         StrategyFn::arc("CLOCK_RESULT", |name: Arc<str>| async move {
//!             Ok::<_, TaskError>(json!({ "name": &*name }))
//!         }),
//!     );
//!
//!     let sup = Supervisor::builder(PoolConfig::default())
//!         .with_strategies(strategies)
//!         .build();
//!     let mut events = sup.subscribe();
//!
//!     let poller = PollerConfig::new("clock-1", "clock")
//!         .with_intervals(Duration::from_millis(50), Duration::from_millis(500));
//!     sup.spawn(vec![poller]).await?;
//!
//!     loop {
//!         let ev = events.recv().await?;
//!         if ev.kind == EventKind::PollResult {
//!             assert_eq!(ev.tag.as_deref(), Some("CLOCK_RESULT"));
//!             break;
//!         }
//!     }
//!
//!     sup.shutdown("done").await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod protocol;
mod strategies;
mod subscribers;

pub mod logging;

// ---- Public re-exports ----

pub use crate::core::{PollerConfig, PoolConfig, Supervisor, SupervisorBuilder};
pub use error::{ConfigError, RuntimeError, StrategyError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::BackoffPolicy;
pub use protocol::{Command, WorkerEvent};
pub use strategies::{
    FakeApi, HttpPoll, Strategies, StrategyFactory, StrategyFn, StrategyRef, TaskStrategy,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
