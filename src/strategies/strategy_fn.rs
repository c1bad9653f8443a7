//! # Function-backed strategy (`StrategyFn`)
//!
//! [`StrategyFn`] wraps a closure `F: Fn(Arc<str>) -> Fut`, producing a fresh
//! future per poll. No state is shared between polls unless the closure
//! captures it explicitly (e.g. an `Arc<AtomicU32>`).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use pollvisor::{StrategyFn, StrategyRef, TaskError};
//!
//! let s: StrategyRef = StrategyFn::arc("PING_RESULT", |name: Arc<str>| async move {
//!     Ok::<_, TaskError>(json!({ "pong": &*name }))
//! });
//!
//! assert_eq!(s.result_tag(), "PING_RESULT");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::strategies::strategy::TaskStrategy;

/// Function-backed strategy implementation.
pub struct StrategyFn<F> {
    tag: Cow<'static, str>,
    f: F,
}

impl<F> StrategyFn<F> {
    /// Creates a new function-backed strategy with the given result tag.
    pub fn new(tag: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { tag: tag.into(), f }
    }

    /// Creates the strategy and returns it as a shared handle.
    pub fn arc(tag: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(tag, f))
    }
}

#[async_trait]
impl<F, Fut> TaskStrategy for StrategyFn<F>
where
    F: Fn(Arc<str>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    fn result_tag(&self) -> &str {
        &self.tag
    }

    async fn poll(&self, name: &str) -> Result<Value, TaskError> {
        (self.f)(Arc::from(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_closure_receives_name() {
        let s = StrategyFn::new("ECHO_RESULT", |name: Arc<str>| async move {
            Ok::<_, TaskError>(json!({ "name": &*name }))
        });
        assert_eq!(s.poll("PollerA").await.unwrap(), json!({"name": "PollerA"}));
    }

    #[tokio::test]
    async fn test_fresh_future_per_poll() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let s = StrategyFn::new("COUNT_RESULT", move |_name: Arc<str>| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n % 2 == 0 {
                    Err(TaskError::fail(format!("even call {n}")))
                } else {
                    Ok(json!(n))
                }
            }
        });

        assert!(s.poll("x").await.is_ok());
        assert!(s.poll("x").await.is_err());
        assert!(s.poll("x").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
