//! Feed client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::policy::RetryPolicy;

/// Construction-time configuration for a feed client. Immutable once the
/// client is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint, e.g. "ws://localhost:8080/ws"
    pub endpoint: String,
    /// Fixed delay between reconnection attempts, in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Consecutive failed attempts tolerated before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound on a single open attempt (unset = wait on the transport)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

fn default_retry_interval_ms() -> u64 { 5_000 }
fn default_max_attempts() -> u32 { 5 }

impl FeedConfig {
    /// Config for `endpoint` with default retry settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            retry_interval_ms: default_retry_interval_ms(),
            max_attempts: default_max_attempts(),
            connect_timeout_ms: None,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, FeedError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.endpoint.trim().is_empty() {
            return Err(FeedError::InvalidConfig("endpoint must not be empty".into()));
        }
        if self.retry_interval_ms == 0 {
            return Err(FeedError::InvalidConfig(
                "retry_interval_ms must be positive".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(FeedError::InvalidConfig("max_attempts must be positive".into()));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(FeedError::InvalidConfig(
                "connect_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_interval_ms), self.max_attempts)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied_from_json() {
        let config = FeedConfig::from_json_str(r#"{"endpoint":"ws://localhost:8080/ws"}"#).unwrap();
        assert_eq!(config.retry_interval_ms, 5_000);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn missing_endpoint_rejected() {
        let err = FeedConfig::from_json_str(r#"{"max_attempts":3}"#).unwrap_err();
        assert!(matches!(err, FeedError::Serialization(_)));
    }

    #[test]
    fn zero_values_rejected() {
        let base = FeedConfig::new("ws://node");
        assert!(base.clone().with_max_attempts(0).validate().is_err());
        assert!(base.clone().with_retry_interval(Duration::ZERO).validate().is_err());
        assert!(FeedConfig::new("  ").validate().is_err());
        assert!(base.validate().is_ok());
    }

    #[test]
    fn retry_policy_from_config() {
        let policy = FeedConfig::new("ws://node")
            .with_retry_interval(Duration::from_millis(100))
            .with_max_attempts(3)
            .retry_policy();
        assert_eq!(policy.interval(), Duration::from_millis(100));
        assert_eq!(policy.max_attempts(), 3);
    }
}
