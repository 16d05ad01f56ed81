//! Client configuration.

use std::time::Duration;

use txledger_common::DEFAULT_REQUEST_TIMEOUT;

/// Configuration for [`LedgerClient`](crate::LedgerClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway address, `host:port`.
    pub server_addr: String,
    /// Time allowed to establish the connection.
    pub connect_timeout: Duration,
    /// Budget sent with each request and waited on locally.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "localhost:50091".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TXLEDGER_SERVER_ADDR") {
            config.server_addr = addr;
        }

        if let Ok(ms) = std::env::var("TXLEDGER_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.server_addr.is_empty() {
            return Err("Server address cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        Ok(())
    }
}
