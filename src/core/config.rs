//! # Pool and poller configuration.
//!
//! Provides [`PoolConfig`], the supervisor runtime settings plus the list of
//! pollers to spawn, and [`PollerConfig`], one worker's identity and intervals.
//!
//! Both deserialize from TOML; durations are written as integer milliseconds:
//! ```toml
//! grace_ms = 1000
//! cleanup_grace_ms = 200
//!
//! [[pollers]]
//! name = "PollerA"
//! kind = "fake"
//! base_interval_ms = 2000
//! max_interval_ms = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policies::BackoffPolicy;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: how long `shutdown` waits for workers to acknowledge `stop`
///   before force-terminating them
/// - `cleanup_grace`: how long a worker's cleanup lets its loop settle before
///   it reports `STOPPED`
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `mailbox_capacity`: per-worker command and event channel size (min 1)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Shutdown grace window before forced termination.
    #[serde(rename = "grace_ms", with = "duration_millis")]
    pub grace: Duration,

    /// Settle period at the end of a worker's cleanup.
    #[serde(rename = "cleanup_grace_ms", with = "duration_millis")]
    pub cleanup_grace: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Capacity of each worker's command and event channels.
    pub mailbox_capacity: usize,

    /// Pollers spawned by [`Supervisor::run`](crate::Supervisor::run).
    pub pollers: Vec<PollerConfig>,
}

impl PoolConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&data)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        let cfg: PoolConfig = toml::from_str(data)?;
        for poller in &cfg.pollers {
            poller.validate()?;
        }
        Ok(cfg)
    }

    /// Three simulated pollers (`PollerA`, `PollerB`, `PollerC`) on a
    /// 2s base / 10s cap schedule.
    pub fn demo() -> Self {
        let pollers = ["PollerA", "PollerB", "PollerC"]
            .into_iter()
            .map(|name| {
                PollerConfig::new(name, "fake")
                    .with_intervals(Duration::from_millis(2000), Duration::from_millis(10_000))
            })
            .collect();
        Self {
            pollers,
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a mailbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }
}

impl Default for PoolConfig {
    /// - `grace = 1000ms`
    /// - `cleanup_grace = 200ms`
    /// - `bus_capacity = 1024`
    /// - `mailbox_capacity = 32`
    /// - no pollers
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(1000),
            cleanup_grace: Duration::from_millis(200),
            bus_capacity: 1024,
            mailbox_capacity: 32,
            pollers: Vec::new(),
        }
    }
}

/// One poller: its unique name, strategy kind and backoff intervals.
///
/// `name` is the registry key and the tag on every event the worker emits.
/// Callers must keep names unique: spawning a duplicate replaces the
/// previous worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Unique worker name.
    pub name: String,

    /// Strategy kind, resolved through [`Strategies`](crate::Strategies).
    pub kind: String,

    /// Interval after a successful poll.
    #[serde(
        rename = "base_interval_ms",
        with = "duration_millis",
        default = "default_base_interval"
    )]
    pub base_interval: Duration,

    /// Backoff cap.
    #[serde(
        rename = "max_interval_ms",
        with = "duration_millis",
        default = "default_max_interval"
    )]
    pub max_interval: Duration,

    /// Target URL for strategies that poll a remote endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Per-poll deadline for strategies that honor one.
    #[serde(
        rename = "timeout_ms",
        default,
        with = "opt_duration_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

fn default_base_interval() -> Duration {
    BackoffPolicy::default().base
}

fn default_max_interval() -> Duration {
    BackoffPolicy::default().max
}

impl PollerConfig {
    /// Creates a poller config with default intervals (30s base, 300s cap).
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            base_interval: default_base_interval(),
            max_interval: default_max_interval(),
            url: None,
            timeout: None,
        }
    }

    /// Sets base interval and cap.
    pub fn with_intervals(mut self, base: Duration, max: Duration) -> Self {
        self.base_interval = base;
        self.max_interval = max;
        self
    }

    /// Sets the target URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the per-poll deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks `base_interval > 0` and `max_interval >= base_interval`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = if self.name.is_empty() {
            "name must not be empty"
        } else if self.base_interval.is_zero() {
            "base_interval_ms must be greater than zero"
        } else if self.max_interval < self.base_interval {
            "max_interval_ms must be at least base_interval_ms"
        } else {
            return Ok(());
        };
        Err(ConfigError::InvalidPoller {
            name: self.name.clone(),
            reason,
        })
    }

    /// Backoff policy derived from the configured intervals.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.base_interval, self.max_interval)
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod opt_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
