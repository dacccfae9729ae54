//! Configuration file support for flowmgrd
//!
//! Loads and validates flowmgrd configuration from TOML files.
//! Default location: /etc/sonic/flowmgrd.toml

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowMgrError, Result};

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/flowmgrd.toml";

/// Statistics polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run the periodic poller
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// REST API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP listener port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Serve the REST API
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

/// Complete flowmgrd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMgrConfig {
    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_interval_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8181
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            enabled: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl FlowMgrConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "flowmgrd: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(FlowMgrError::Io(e)),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            FlowMgrError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }

    /// Socket address for the REST API listener
    pub fn api_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.api.bind_address.parse().map_err(|e| {
            FlowMgrError::Config(format!(
                "Invalid bind_address {}: {}",
                self.api.bind_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.api.port))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(FlowMgrError::Config(
                "poller.interval_secs must be > 0".to_string(),
            ));
        }

        if self.api.enabled {
            self.api_addr()?;
        }

        if self.logging.level.trim().is_empty() {
            return Err(FlowMgrError::Config(
                "logging.level must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
