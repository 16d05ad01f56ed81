//! Gateway configuration.

use std::time::Duration;

use txledger_common::DEFAULT_REQUEST_TIMEOUT;

/// Main gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Bootstrap feed (JSON array of transaction records).
    pub json_db: Option<String>,
    /// Budget for requests that carry no deadline.
    pub request_timeout: Duration,
    /// Upper bound on caller-supplied deadlines.
    pub max_request_timeout: Duration,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 50091,
            json_db: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_request_timeout: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TXLEDGER_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("TXLEDGER_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(path) = std::env::var("TXLEDGER_JSON_DB") {
            config.json_db = Some(path);
        }

        if let Ok(ms) = std::env::var("TXLEDGER_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Deadline budget for a request, clamped to the configured maximum.
    pub fn request_budget(&self, deadline_ms: Option<u64>) -> Duration {
        deadline_ms
            .map(Duration::from_millis)
            .unwrap_or(self.request_timeout)
            .min(self.max_request_timeout)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be 0".to_string());
        }

        if self.request_timeout > self.max_request_timeout {
            return Err("Request timeout cannot exceed max request timeout".to_string());
        }

        Ok(())
    }
}
