//! `robocmd.toml`: runner settings for the scheduler and its robot loop.
//!
//! Every section is optional. A missing file section falls back to
//! [`Default`], so an empty file is a valid configuration.
//!
//! ```rust,no_run
//! use robocmd_common::config::{ConfigLoader, RobocmdConfig};
//! use std::path::Path;
//!
//! let config = RobocmdConfig::load(Path::new("robocmd.toml")).unwrap();
//! config.validate().unwrap();
//! assert!(config.robot_loop.period_ms > 0);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default robot control-loop period in milliseconds.
pub const DEFAULT_PERIOD_MS: u64 = 20;

/// Failure to obtain a usable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field parsed but holds an unusable value.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Verbosity of the runner's log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// `[shared]`: identity and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    pub log_level: LogLevel,
    /// Name the runner logs itself under.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "robocmd".to_string(),
        }
    }
}

/// `[scheduler]`: start-up state of the command scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Initial state of the scheduler kill switch.
    pub enabled: bool,
    /// Write running-set and ownership changes to the telemetry sink.
    pub publish_telemetry: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            publish_telemetry: true,
        }
    }
}

/// `[robot_loop]`: main-loop pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotLoopConfig {
    /// Control-loop period [ms].
    pub period_ms: u64,
    /// Stop after this many ticks (0 = run until shutdown).
    pub max_ticks: u64,
}

impl RobotLoopConfig {
    /// Loop period as a `Duration`.
    #[inline]
    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for RobotLoopConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            max_ticks: 0,
        }
    }
}

/// The whole `robocmd.toml`.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "practice-bot"
///
/// [scheduler]
/// publish_telemetry = false
///
/// [robot_loop]
/// period_ms = 10
/// max_ticks = 500
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobocmdConfig {
    pub shared: SharedConfig,
    pub scheduler: SchedulerConfig,
    pub robot_loop: RobotLoopConfig,
}

impl RobocmdConfig {
    /// Parse an in-memory document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject values that parse but can not drive a robot loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "shared.service_name",
                reason: "must not be blank",
            });
        }
        if self.robot_loop.period_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "robot_loop.period_ms",
                reason: "must be at least 1 ms",
            });
        }
        Ok(())
    }
}

/// Read any deserializable settings type from a TOML file.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Ok(toml::from_str(&text)?)
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
