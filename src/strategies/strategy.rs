//! # Task strategy abstraction.
//!
//! A [`TaskStrategy`] is the unit of work one poller performs on every loop
//! iteration. The poll loop owns scheduling, backoff and event emission; the
//! strategy only answers "what did this poll return?".
//!
//! The common handle type is [`StrategyRef`], an `Arc<dyn TaskStrategy>`
//! suitable for sharing across worker units.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;

/// Shared handle to a task strategy.
pub type StrategyRef = Arc<dyn TaskStrategy>;

/// # One poll of remote or simulated work.
///
/// Implementations may fail freely: every `Err` becomes an `ERROR` event and
/// a backoff step, never a worker exit. A strategy is not cancelled by
/// `stop`; only forced termination of the unit abandons an in-flight poll.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::{Value, json};
/// use pollvisor::{TaskError, TaskStrategy};
///
/// struct Clock;
///
/// #[async_trait]
/// impl TaskStrategy for Clock {
///     fn result_tag(&self) -> &str { "CLOCK_RESULT" }
///
///     async fn poll(&self, name: &str) -> Result<Value, TaskError> {
///         Ok(json!({ "name": name }))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskStrategy: Send + Sync + 'static {
    /// Event tag used for successful polls (the `<TASK>_RESULT` event name).
    fn result_tag(&self) -> &str {
        "RESULT"
    }

    /// Performs one poll on behalf of worker `name`.
    async fn poll(&self, name: &str) -> Result<Value, TaskError>;
}
