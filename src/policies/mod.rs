//! Poll retry policy.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the idle delay grows after consecutive failures
//!   (`round(base × ln(attempt + 1))`, capped at `max`).
//!
//! ## Quick wiring
//! ```text
//! PollerConfig { base_interval, max_interval }
//!      └─► PollerConfig::backoff() ─► BackoffPolicy
//!           └─► core::poll_loop::PollState::record_failure(&policy)
//! ```

mod backoff;

pub use backoff::BackoffPolicy;
