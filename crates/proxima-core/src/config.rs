//! Service configuration.
//!
//! Settings are layered with the [`config`] crate, lowest priority first:
//!
//! 1. Built-in defaults (every section is `#[serde(default)]`)
//! 2. A TOML file (`PROXIMA_CONFIG`, or the platform default path)
//! 3. Environment variables such as `PROXIMA__SERVER__PORT=8080`
//!
//! All durations are expressed in whole seconds.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "PROXIMA_CONFIG";

/// Prefix for environment overrides (`PROXIMA__<SECTION>__<KEY>`).
pub const ENV_PREFIX: &str = "PROXIMA";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field failed validation.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value is invalid.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Distance estimation calibration.
    pub distance: DistanceConfig,
    /// Staleness eviction thresholds.
    pub eviction: EvictionConfig,
    /// Notification log limits.
    pub notifications: NotificationConfig,
    /// Producer health windows.
    pub health: HealthConfig,
    /// Periodic real-time pushes.
    pub broadcast: BroadcastConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Calibration for the log-distance path-loss model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Expected RSSI (dBm) at one distance unit.
    pub reference_power: i32,
    /// Distances at or below this count as "in range".
    pub near_threshold: f64,
    /// Distance assumed when a reading has neither distance nor RSSI.
    pub default_distance: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            reference_power: -59,
            near_threshold: 2.0,
            default_distance: 5.0,
        }
    }
}

/// Staleness eviction thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Age after which a record is dropped on the next submission.
    pub inline_threshold_secs: u64,
    /// Age after which a record is dropped by the periodic sweep.
    pub sweep_threshold_secs: u64,
    /// How often the periodic sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            inline_threshold_secs: 120,
            sweep_threshold_secs: 300,
            sweep_interval_secs: 300,
        }
    }
}

/// Notification log limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Maximum number of retained notifications.
    pub capacity: usize,
    /// Notifications received longer ago than this are purged.
    pub retention_secs: u64,
    /// Number of notifications included in snapshots pushed to viewers.
    pub snapshot_size: usize,
    /// Default `limit` for `GET /notifications`.
    pub default_limit: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            retention_secs: 2 * 60 * 60,
            snapshot_size: 20,
            default_limit: 50,
        }
    }
}

/// Producer health windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// A producer seen within this window is "active".
    pub active_window_secs: u64,
    /// A producer seen within this window is "healthy".
    pub healthy_window_secs: u64,
    /// How often health is evaluated for alerting.
    pub check_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            active_window_secs: 60,
            healthy_window_secs: 120,
            check_interval_secs: 60,
        }
    }
}

/// Periodic real-time pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Interval of `system-stats-update` pushes. `0` disables them.
    pub stats_interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 30,
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON file logging plus compact stdout when `true`.
    pub production: bool,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            level: "info".to_string(),
        }
    }
}

/// Converts whole seconds to a [`TimeDelta`], saturating on overflow.
#[must_use]
pub fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl EvictionConfig {
    /// Inline eviction threshold.
    #[must_use]
    pub fn inline_threshold(&self) -> TimeDelta {
        secs(self.inline_threshold_secs)
    }

    /// Periodic sweep eviction threshold.
    #[must_use]
    pub fn sweep_threshold(&self) -> TimeDelta {
        secs(self.sweep_threshold_secs)
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// With `path = None` the file named by `PROXIMA_CONFIG` is used, falling
    /// back to [`default_config_path`]; either may be absent. An explicit
    /// `path` must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, a source cannot be
    /// parsed, or the merged values fail [`Config::validate`].
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        match explicit {
            Some(file) => {
                if !file.exists() {
                    return Err(ConfigError::NotFound(file));
                }
                builder = builder.add_source(config::File::from(file));
            }
            None => {
                if let Some(file) = default_config_path() {
                    builder = builder.add_source(config::File::from(file).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or, when several
    /// fields are wrong, [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::ValidationError {
                    field: field.to_string(),
                    message: message.to_string(),
                });
            }
        };

        check(!self.server.host.is_empty(), "server.host", "must not be empty");
        check(self.server.port != 0, "server.port", "must be non-zero");

        check(
            (-120..=0).contains(&self.distance.reference_power),
            "distance.reference_power",
            "must be between -120 and 0 dBm",
        );
        check(
            self.distance.near_threshold.is_finite() && self.distance.near_threshold > 0.0,
            "distance.near_threshold",
            "must be a positive number",
        );
        check(
            self.distance.default_distance.is_finite() && self.distance.default_distance >= 0.0,
            "distance.default_distance",
            "must be a non-negative number",
        );

        check(
            self.eviction.inline_threshold_secs > 0,
            "eviction.inline_threshold_secs",
            "must be greater than zero",
        );
        check(
            self.eviction.sweep_threshold_secs > 0,
            "eviction.sweep_threshold_secs",
            "must be greater than zero",
        );
        check(
            self.eviction.sweep_interval_secs > 0,
            "eviction.sweep_interval_secs",
            "must be greater than zero",
        );

        check(
            self.notifications.capacity > 0,
            "notifications.capacity",
            "must be greater than zero",
        );
        check(
            self.notifications.retention_secs > 0,
            "notifications.retention_secs",
            "must be greater than zero",
        );
        check(
            self.notifications.snapshot_size <= self.notifications.capacity,
            "notifications.snapshot_size",
            "must not exceed notifications.capacity",
        );

        check(
            self.health.active_window_secs > 0,
            "health.active_window_secs",
            "must be greater than zero",
        );
        check(
            self.health.healthy_window_secs >= self.health.active_window_secs,
            "health.healthy_window_secs",
            "must be at least health.active_window_secs",
        );
        check(
            self.health.check_interval_secs > 0,
            "health.check_interval_secs",
            "must be greater than zero",
        );

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Returns the platform default configuration file path.
///
/// `/etc/proxima/config.toml` on Linux, the per-user config directory
/// elsewhere.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Some(PathBuf::from("/etc/proxima/config.toml"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "proxima")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
