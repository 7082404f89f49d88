//! Manager configuration.
//!
//! Loaded from a TOML file at startup; every field has a default so a bare
//! `[manager]`-less file (or no file at all) still yields a working manager.
//!
//! ```toml
//! bind_host = "0.0.0.0"
//! port = 15440
//! connect_timeout_ms = 5000
//! ack_timeout_ms = 10000
//! control_timeout_ms = 5000
//! max_record_size = 16777216
//! ```

use crate::MigrationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for one host's registry, client, and server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Address the migration listener binds to.
    pub bind_host: String,
    /// Well-known migration port.
    pub port: u16,
    /// Timeout for establishing an outbound transfer connection.
    pub connect_timeout_ms: u64,
    /// Timeout for reading the transfer acknowledgement.
    pub ack_timeout_ms: u64,
    /// Timeout for a unit to acknowledge suspend/terminate at a safe point.
    pub control_timeout_ms: u64,
    /// Upper bound on a serialized unit record.
    pub max_record_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 15440,
            connect_timeout_ms: 5_000,
            ack_timeout_ms: 10_000,
            control_timeout_ms: 5_000,
            max_record_size: 16 * 1024 * 1024,
        }
    }
}

impl ManagerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MigrationError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MigrationError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&contents)
            .map_err(|e| MigrationError::Config(format!("failed to parse config: {e}")))
    }

    /// The listener's bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// Resolve an operator-supplied destination. A bare host gets the
    /// configured migration port appended; `host:port` passes through.
    pub fn migration_addr(&self, destination: &str) -> String {
        if destination.contains(':') {
            destination.to_string()
        } else {
            format!("{destination}:{}", self.port)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ManagerConfig = toml::from_str("port = 9000\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.max_record_size, 16 * 1024 * 1024);
    }

    #[test]
    fn migration_addr_appends_port_to_bare_host() {
        let config = ManagerConfig::default();
        assert_eq!(config.migration_addr("10.0.0.2"), "10.0.0.2:15440");
        assert_eq!(config.migration_addr("10.0.0.2:9000"), "10.0.0.2:9000");
    }

    #[test]
    fn from_file_reports_missing_file_as_config_error() {
        let result = ManagerConfig::from_file("/nonexistent/portage.toml");
        assert!(matches!(result, Err(MigrationError::Config(_))));
    }
}
