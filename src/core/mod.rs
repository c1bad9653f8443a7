//! Runtime core: configuration, poll loop, worker lifecycle and supervision.
//!
//! The public API from this module is [`Supervisor`] (with its
//! [`SupervisorBuilder`]) and the configuration types [`PoolConfig`] and
//! [`PollerConfig`].
//!
//! Internal modules:
//! - [`poll_loop`]: one poller's backoff loop and its `PollState`;
//! - [`worker`]: lifecycle handler for one unit (start/stop/cleanup);
//! - [`registry`]: name → unit handle map with unit ids;
//! - [`supervisor`]: spawns units, forwards events, two-phase shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod poll_loop;
mod registry;
mod shutdown;
mod supervisor;
mod worker;

pub use builder::SupervisorBuilder;
pub use config::{PollerConfig, PoolConfig};
pub use supervisor::Supervisor;

pub(crate) use poll_loop::panic_message;
