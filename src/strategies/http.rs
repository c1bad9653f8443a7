//! # HTTP GET poller.
//!
//! [`HttpPoll`] fetches one URL per poll. A non-2xx status, a transport error
//! or an elapsed deadline is a failed poll; a JSON body is returned as-is and
//! any other body as a JSON string.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::core::PollerConfig;
use crate::error::{StrategyError, TaskError};
use crate::strategies::strategy::TaskStrategy;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote endpoint poller (kind `http`).
#[derive(Clone, Debug)]
pub struct HttpPoll {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpPoll {
    /// Creates a poller for `url` with a per-request deadline.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StrategyError> {
        let url = Url::parse(url).map_err(|e| StrategyError::InvalidField {
            field: "url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StrategyError::InvalidField {
                field: "url",
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StrategyError::Build(e.to_string()))?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Builds a poller from a config entry (`url` required, `timeout_ms` optional).
    pub fn from_config(cfg: &PollerConfig) -> Result<Self, StrategyError> {
        let url = cfg.url.as_deref().ok_or(StrategyError::MissingField {
            kind: "http",
            field: "url",
        })?;
        Self::new(url, cfg.timeout.unwrap_or(DEFAULT_TIMEOUT))
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn map_err(&self, err: reqwest::Error) -> TaskError {
        if err.is_timeout() {
            TaskError::Timeout {
                timeout: self.timeout,
            }
        } else {
            TaskError::fail(err.to_string())
        }
    }
}

#[async_trait]
impl TaskStrategy for HttpPoll {
    fn result_tag(&self) -> &str {
        "HTTP_RESULT"
    }

    async fn poll(&self, _name: &str) -> Result<Value, TaskError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.map_err(e))?;

        let body = resp.text().await.map_err(|e| self.map_err(e))?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_url() {
        let cfg = PollerConfig::new("status", "http");
        let err = HttpPoll::from_config(&cfg).unwrap_err();
        assert_eq!(err.as_label(), "strategy_missing_field");
    }

    #[test]
    fn test_rejects_bad_url() {
        let cfg = PollerConfig::new("status", "http").with_url("not a url");
        let err = HttpPoll::from_config(&cfg).unwrap_err();
        assert_eq!(err.as_label(), "strategy_invalid_field");

        let cfg = PollerConfig::new("status", "http").with_url("ftp://example.com/file");
        assert!(HttpPoll::from_config(&cfg).is_err());
    }

    #[test]
    fn test_from_config() {
        let cfg = PollerConfig::new("status", "http")
            .with_url("http://127.0.0.1:9/health")
            .with_timeout(Duration::from_millis(250));
        let poll = HttpPoll::from_config(&cfg).unwrap();
        assert_eq!(poll.url().as_str(), "http://127.0.0.1:9/health");
        assert_eq!(poll.timeout, Duration::from_millis(250));
        assert_eq!(poll.result_tag(), "HTTP_RESULT");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_failed_poll() {
        // Port 9 (discard) is not expected to serve HTTP on loopback.
        let poll = HttpPoll::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        assert!(poll.poll("status").await.is_err());
    }
}
