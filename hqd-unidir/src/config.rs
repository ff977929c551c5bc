//! Dispatcher configuration and tunable parameters.
//!
//! Configuration is plain data loaded from TOML:
//!
//! ```toml
//! [dispatcher]
//! max_pending_streams = 64
//! reject_truncated_prefaces = true
//!
//! [logging]
//! level = "info"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the unidirectional stream dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of streams awaiting classification (default: 64).
    ///
    /// A peer that opens unidirectional streams and never completes their
    /// prefaces pins dispatcher state. Streams beyond this limit are refused
    /// by `take_temporary_ownership`. Set to 0 for unlimited.
    pub max_pending_streams: usize,

    /// Reject a stream whose FIN arrives before the preface is complete
    /// (default: true).
    ///
    /// When false, such streams stay pending until connection teardown.
    pub reject_truncated_prefaces: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_pending_streams: 64,
            reject_truncated_prefaces: true,
        }
    }
}

impl DispatcherConfig {
    /// Tight limits for servers exposed to untrusted peers.
    ///
    /// HTTP/3 peers need at most a control stream, two codec side channels
    /// and a handful of push streams.
    pub fn strict() -> Self {
        Self {
            max_pending_streams: 8,
            reject_truncated_prefaces: true,
        }
    }

    /// `None` means unlimited.
    pub fn pending_limit(&self) -> Option<usize> {
        (self.max_pending_streams != 0).then_some(self.max_pending_streams)
    }

    /// Validate configuration values are within reasonable bounds.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_pending_streams > 1 << 20 {
            errors.push(format!(
                "dispatcher.max_pending_streams too large: {} (max {})",
                self.max_pending_streams,
                1 << 20
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (default: "info").
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(vec![format!(
                "logging.level must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.level
            )])
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HqdConfig {
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingConfig,
}

impl HqdConfig {
    /// Validate every section, collecting all problems.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Err(e) = self.dispatcher.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.logging.validate() {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: HqdConfig = toml::from_str(s)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error: defaults are used and a warning is logged.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<HqdConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        tracing::warn!(
            config_path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(HqdConfig::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    HqdConfig::from_toml_str(&contents)
}
