//! # Simulated remote call.
//!
//! [`FakeApi`] stands in for a real endpoint: each poll waits a random
//! latency and then fails with a fixed probability. Useful for demos and for
//! watching the backoff curve without a server.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::{Value, json};

use crate::error::TaskError;
use crate::strategies::strategy::TaskStrategy;

/// Simulated API poller (kind `fake`).
///
/// A successful poll returns `{ "name", "delay", "timestamp" }`.
#[derive(Clone, Debug)]
pub struct FakeApi {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
}

impl Default for FakeApi {
    /// Latency uniformly in `[1000ms, 3000ms)`, 20% failures.
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
            failure_rate: 0.2,
        }
    }
}

impl FakeApi {
    /// Creates a simulator with default latency and failure rate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated latency range `[min, max)`.
    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    /// Sets the failure probability (clamped to `0.0..=1.0`).
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    fn pick_delay(&self, rng: &mut impl Rng) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if max <= min {
            return self.min_delay;
        }
        Duration::from_millis(rng.random_range(min..max))
    }
}

#[async_trait]
impl TaskStrategy for FakeApi {
    fn result_tag(&self) -> &str {
        "FAKE_API_RESULT"
    }

    async fn poll(&self, name: &str) -> Result<Value, TaskError> {
        // ThreadRng is !Send; draw everything before the first await.
        let (delay, fail) = {
            let mut rng = rand::rng();
            (self.pick_delay(&mut rng), rng.random_bool(self.failure_rate))
        };

        tokio::time::sleep(delay).await;

        if fail {
            return Err(TaskError::fail(format!("{name} failed!")));
        }
        Ok(json!({
            "name": name,
            "delay": delay.as_millis() as u64,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }))
    }
}
