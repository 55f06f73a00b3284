// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration (endpoints and default deadlines).

use crate::error::{AgentError, Result};
use std::time::Duration;

pub const DEFAULT_REQUEST_ENDPOINT: &str = "tcp://127.0.0.1:7897";
pub const DEFAULT_PUBLISH_ENDPOINT: &str = "tcp://127.0.0.1:7898";

/// Configuration for an [`AgentClient`](crate::client::AgentClient).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Controller request endpoint (point-to-point request/reply)
    pub request_endpoint: String,

    /// Controller publish endpoint (fan-out state snapshots)
    pub publish_endpoint: String,

    /// Socket connect deadline
    pub connect_timeout: Duration,

    /// Default correlator deadline per request
    pub request_timeout: Duration,

    /// Default confirmation-watch deadline
    pub confirm_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            request_endpoint: DEFAULT_REQUEST_ENDPOINT.to_string(),
            publish_endpoint: DEFAULT_PUBLISH_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            confirm_timeout: Duration::from_secs(5),
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.request_endpoint = endpoint.into();
        self
    }

    pub fn with_publish_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.publish_endpoint = endpoint.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint("request", &self.request_endpoint)?;
        validate_endpoint("publish", &self.publish_endpoint)?;
        if self.request_timeout.is_zero() || self.confirm_timeout.is_zero() {
            return Err(AgentError::InvalidConfig(
                "timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(label: &str, endpoint: &str) -> Result<()> {
    let address = endpoint.strip_prefix("tcp://").ok_or_else(|| {
        AgentError::InvalidConfig(format!("invalid {} endpoint: {}", label, endpoint))
    })?;
    if address.is_empty() {
        return Err(AgentError::InvalidConfig(format!(
            "empty {} endpoint address",
            label
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let config = AgentConfig::new()
            .with_request_endpoint("tcp://10.0.0.5:7897")
            .with_request_timeout(Duration::from_millis(500));
        assert_eq!(config.request_endpoint, "tcp://10.0.0.5:7897");
        assert_eq!(config.request_timeout, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_tcp_endpoint() {
        let config = AgentConfig::new().with_publish_endpoint("ipc:///tmp/decide");
        assert!(matches!(
            config.validate(),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = AgentConfig::new().with_confirm_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
