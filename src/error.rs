//! Error types used by the pollvisor runtime, strategies and configuration.
//!
//! - [`RuntimeError`] errors raised by the supervisor itself.
//! - [`TaskError`] errors raised by one poll of a task strategy.
//! - [`StrategyError`] a poller's kind could not be turned into a strategy.
//! - [`ConfigError`] configuration could not be read or is invalid.
//!
//! Each type provides `as_label` for logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the pollvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace window elapsed; the listed workers were force-terminated.
    #[error("shutdown grace {grace:?} exceeded; force-terminated: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of workers that had not stopped in time.
        stuck: Vec<String>,
    },

    /// The supervisor is shutting down and accepts no new workers.
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pollvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(1), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::ShuttingDown => "runtime_shutting_down",
        }
    }
}

/// # Errors produced by a single poll.
///
/// All of them are transient from the poll loop's point of view: they are
/// reported as `ERROR` events and trigger backoff, never a worker exit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The poll failed.
    #[error("poll failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The poll did not complete within its own deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The strategy panicked while polling.
    #[error("strategy panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pollvisor::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }
}

/// # Errors resolving a poller's kind into a strategy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StrategyError {
    /// No strategy is registered for this kind.
    #[error("no strategy registered for poller kind {kind:?}")]
    UnknownKind {
        /// The requested kind.
        kind: String,
    },

    /// The strategy needs a field the poller config does not set.
    #[error("poller kind {kind:?} requires field `{field}`")]
    MissingField {
        /// The strategy kind.
        kind: &'static str,
        /// The missing field.
        field: &'static str,
    },

    /// A field is present but unusable.
    #[error("invalid `{field}`: {reason}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The strategy could not be constructed.
    #[error("failed to build strategy: {0}")]
    Build(String),
}

impl StrategyError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StrategyError::UnknownKind { .. } => "strategy_unknown_kind",
            StrategyError::MissingField { .. } => "strategy_missing_field",
            StrategyError::InvalidField { .. } => "strategy_invalid_field",
            StrategyError::Build(_) => "strategy_build_failed",
        }
    }
}

/// # Errors loading or validating configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`PoolConfig`](crate::PoolConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A poller entry violates an interval invariant.
    #[error("poller {name:?}: {reason}")]
    InvalidPoller {
        /// The poller name.
        name: String,
        /// The violated rule.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::InvalidPoller { .. } => "config_invalid_poller",
        }
    }
}
