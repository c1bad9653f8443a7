//! # Event subscribers for the pollvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   unit monitors / Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                            │
//!                                                                 ┌──────────┼──────────┐
//!                                                                 ▼          ▼          ▼
//!                                                             LogWriter   Metrics    Custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
