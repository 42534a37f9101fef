//! # Configuration Management
//!
//! Node configuration for the relay protocol core.
//!
//! Covers the settings this core actually owns: the YP announce
//! endpoint, the listener, and logging. Loaded from TOML files or
//! strings, with validation that reports all findings at once.
//!
//! The 3-second socket send/receive timeout is part of the wire-level
//! behaviour and intentionally not configurable here.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::service::node::DEFAULT_YP_PORT;

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NodeConfig {
    /// YP announce endpoint
    #[serde(default)]
    pub yp: YpConfig,

    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Generate example configuration file content.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration.
    ///
    /// Returns a list of findings; an empty list means the configuration
    /// is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.yp.validate());
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// YP announce endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YpConfig {
    /// Announce host; empty disables announcing.
    pub address: String,

    /// Announce port.
    pub port: u16,
}

impl Default for YpConfig {
    fn default() -> Self {
        YpConfig {
            address: String::new(),
            port: DEFAULT_YP_PORT,
        }
    }
}

impl YpConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.address.is_empty() && self.port == 0 {
            errors.push("YP port cannot be 0 when an address is set".to_string());
        }
        errors
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface to bind; empty means the wildcard address.
    pub interface: String,

    /// Listen port.
    pub port: u16,

    /// Maximum number of concurrently handled client connections.
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            interface: String::new(),
            port: DEFAULT_YP_PORT,
            max_clients: 32,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_clients == 0 {
            errors.push("Max clients must be greater than 0".to_string());
        } else if self.max_clients > 10_000 {
            errors.push(format!(
                "Max clients very high: {} (each costs a worker thread)",
                self.max_clients
            ));
        }
        errors
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn or error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: String::from("info"),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => errors.push(format!("Invalid log level: {other}")),
        }
        errors
    }
}
