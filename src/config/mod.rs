//! Configuration management
//!
//! Loads the JSON config file shared with the relay server deployment.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Relay server host (IP or hostname)
    pub server: String,
    /// Relay server port
    pub server_port: u16,
    /// Local listener bind address
    #[serde(default = "default_local")]
    pub local: String,
    /// Local listener port
    pub local_port: u16,
    /// Shared passphrase; the session key is derived from it
    pub password: String,
}

fn default_local() -> String {
    "127.0.0.1".to_string()
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Address the local listener binds to
    pub fn local_addr(&self) -> String {
        format!("{}:{}", self.local, self.local_port)
    }

    /// Address of the remote relay
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server, self.server_port)
    }
}
