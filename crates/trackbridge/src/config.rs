//! Bridge configuration.
//!
//! Loaded from a TOML file at startup. Every problem found here is fatal:
//! a bridge with a bad destination table would otherwise fail record by
//! record at runtime.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trackbridge_protocol::{BuilderOptions, ProtocolName};
use trackbridge_session::{BackoffConfig, SessionConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Protocol for devices with no assignment.
    #[serde(default)]
    pub default_protocol: Option<ProtocolName>,

    #[serde(default)]
    pub session: SessionSettings,

    /// One destination per protocol.
    pub destinations: BTreeMap<ProtocolName, DestinationConfig>,

    /// Initial device → protocol assignments.
    #[serde(default)]
    pub assignments: BTreeMap<String, ProtocolName>,
}

/// Where one protocol's frames go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub host: String,
    pub port: u16,
    /// Login identity. Without it the last routed device id is used.
    #[serde(default)]
    pub account: Option<String>,
    #[serde(flatten)]
    pub builder: BuilderOptions,
}

/// Timing and retry knobs shared by every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub idle_threshold_secs: u64,
    pub heartbeat_check_secs: u64,
    pub connect_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub connect_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub backoff_jitter: f64,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_threshold_secs: 180,
            heartbeat_check_secs: 10,
            connect_timeout_secs: 5,
            write_timeout_secs: 5,
            connect_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            backoff_jitter: 0.2,
        }
    }
}

impl SessionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// The session-layer view of these settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_threshold: Duration::from_secs(self.idle_threshold_secs),
            heartbeat_period: Duration::from_secs(self.heartbeat_check_secs),
            connect_attempts: self.connect_attempts,
            backoff: BackoffConfig {
                base: Duration::from_millis(self.backoff_base_ms),
                cap: Duration::from_millis(self.backoff_cap_ms),
                jitter: self.backoff_jitter,
            },
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// A config with a single destination, otherwise defaults.
    pub fn single(protocol: ProtocolName, host: impl Into<String>, port: u16) -> Self {
        let mut destinations = BTreeMap::new();
        destinations.insert(
            protocol,
            DestinationConfig {
                host: host.into(),
                port,
                account: None,
                builder: BuilderOptions::default(),
            },
        );
        Self {
            log_level: default_log_level(),
            default_protocol: Some(protocol),
            session: SessionSettings::default(),
            destinations,
            assignments: BTreeMap::new(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destinations.is_empty() {
            return Err(ConfigError::Invalid("no destinations configured".into()));
        }

        for (protocol, dest) in &self.destinations {
            if dest.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "destination {protocol} has an empty host"
                )));
            }
            if dest.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "destination {protocol} has port 0"
                )));
            }
        }

        if let Some(default) = self.default_protocol {
            if !self.destinations.contains_key(&default) {
                return Err(ConfigError::Invalid(format!(
                    "default protocol {default} has no destination"
                )));
            }
        }

        for (device, protocol) in &self.assignments {
            if !self.destinations.contains_key(protocol) {
                return Err(ConfigError::Invalid(format!(
                    "device {device} is assigned to {protocol}, which has no destination"
                )));
            }
        }

        self.session.validate()
    }
}

impl SessionSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("idle_threshold_secs", self.idle_threshold_secs),
            ("heartbeat_check_secs", self.heartbeat_check_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
            ("backoff_base_ms", self.backoff_base_ms),
        ]
        .into_iter()
        .find(|(_, v)| *v == 0);
        if let Some((name, _)) = zero {
            return Err(ConfigError::Invalid(format!("session.{name} must be > 0")));
        }

        if self.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "session.connect_attempts must be at least 1".into(),
            ));
        }
        if self.backoff_base_ms > self.backoff_cap_ms {
            return Err(ConfigError::Invalid(format!(
                "session.backoff_base_ms ({}) exceeds backoff_cap_ms ({})",
                self.backoff_base_ms, self.backoff_cap_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(ConfigError::Invalid(format!(
                "session.backoff_jitter must be within 0..1, got {}",
                self.backoff_jitter
            )));
        }
        Ok(())
    }
}
