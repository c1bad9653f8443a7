//! # Kind → strategy mapping.
//!
//! [`Strategies`] resolves a poller's `kind` into a [`StrategyRef`] at spawn
//! time. Each kind maps to a factory that may inspect the rest of the
//! [`PollerConfig`] (URL, timeout) and reject it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use pollvisor::{PollerConfig, StrategyFn, Strategies, TaskError};
//!
//! let mut strategies = Strategies::builtin();
//! strategies.register_strategy(
//!     "ping",
//!     StrategyFn::arc("PING_RESULT", |_name: Arc<str>| async { Ok::<_, TaskError>(json!("pong")) }),
//! );
//!
//! assert!(strategies.resolve(&PollerConfig::new("a", "ping")).is_ok());
//! assert!(strategies.resolve(&PollerConfig::new("b", "smtp")).is_err());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::PollerConfig;
use crate::error::StrategyError;
use crate::strategies::{FakeApi, HttpPoll, StrategyRef};

/// Builds a strategy for one poller.
pub type StrategyFactory =
    Arc<dyn Fn(&PollerConfig) -> Result<StrategyRef, StrategyError> + Send + Sync>;

/// Registry of strategy factories keyed by poller kind.
#[derive(Clone, Default)]
pub struct Strategies {
    factories: HashMap<String, StrategyFactory>,
}

impl Strategies {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in kinds: `fake` ([`FakeApi`]) and `http` ([`HttpPoll`]).
    pub fn builtin() -> Self {
        let mut s = Self::new();
        s.register("fake", |_cfg| Ok(Arc::new(FakeApi::new()) as StrategyRef));
        s.register("http", |cfg| Ok(Arc::new(HttpPoll::from_config(cfg)?) as StrategyRef));
        s
    }

    /// Registers a factory for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&PollerConfig) -> Result<StrategyRef, StrategyError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Registers one shared strategy instance for every poller of `kind`.
    pub fn register_strategy(
        &mut self,
        kind: impl Into<String>,
        strategy: StrategyRef,
    ) -> &mut Self {
        self.register(kind, move |_cfg| Ok(Arc::clone(&strategy)))
    }

    /// Resolves the strategy for `cfg.kind`.
    pub fn resolve(&self, cfg: &PollerConfig) -> Result<StrategyRef, StrategyError> {
        let factory = self
            .factories
            .get(&cfg.kind)
            .ok_or_else(|| StrategyError::UnknownKind {
                kind: cfg.kind.clone(),
            })?;
        factory(cfg)
    }

    /// Sorted list of registered kinds.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategies")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::strategies::StrategyFn;
    use serde_json::json;

    #[test]
    fn test_builtin_kinds() {
        assert_eq!(Strategies::builtin().kinds(), ["fake", "http"]);
    }

    #[test]
    fn test_unknown_kind() {
        let err = Strategies::builtin()
            .resolve(&PollerConfig::new("PollerX", "carrier-pigeon"))
            .err()
            .unwrap();
        assert!(matches!(err, StrategyError::UnknownKind { ref kind } if kind == "carrier-pigeon"));
    }

    #[test]
    fn test_factory_errors_propagate() {
        let err = Strategies::builtin()
            .resolve(&PollerConfig::new("status", "http"))
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "strategy_missing_field");
    }

    #[test]
    fn test_resolve_fake() {
        let s = Strategies::builtin()
            .resolve(&PollerConfig::new("PollerA", "fake"))
            .unwrap();
        assert_eq!(s.result_tag(), "FAKE_API_RESULT");
    }

    #[test]
    fn test_register_overrides() {
        let mut s = Strategies::builtin();
        s.register_strategy(
            "fake",
            StrategyFn::arc("STUB_RESULT", |_name: Arc<str>| async {
                Ok::<_, TaskError>(json!(null))
            }),
        );
        let resolved = s.resolve(&PollerConfig::new("PollerA", "fake")).unwrap();
        assert_eq!(resolved.result_tag(), "STUB_RESULT");
        assert_eq!(s.kinds().len(), 2);
    }
}
