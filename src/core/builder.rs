use std::sync::Arc;

use crate::{
    core::PoolConfig,
    events::Bus,
    strategies::Strategies,
    subscribers::{Subscribe, SubscriberSet},
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: PoolConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    strategies: Strategies,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration and the built-in strategies.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            strategies: Strategies::builtin(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (worker lifecycle, results, failures)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the kind → strategy mapping used at spawn.
    pub fn with_strategies(mut self, strategies: Strategies) -> Self {
        self.strategies = strategies;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Initializes the event bus, subscriber workers and the listener that
    /// feeds them. Must be called within a Tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        Arc::new(Supervisor::new_internal(self.cfg, bus, subs, self.strategies))
    }
}
