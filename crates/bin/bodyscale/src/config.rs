//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `bodyscale.toml` in the working directory (or the file named by
//! `BODYSCALE_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use serde::Deserialize;

use bodyscale_adapter_ble::BleConfig;
use bodyscale_app::config::{AcquisitionConfig, ProtocolConfig};
use bodyscale_app::error::InvalidConfig;
use bodyscale_domain::error::ProfileError;
use bodyscale_domain::metrics::CalibrationTable;
use bodyscale_domain::profile::{Profile, Sex};

const DEFAULT_PATH: &str = "bodyscale.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Session timeout and stabilization tunables.
    pub acquisition: AcquisitionConfig,
    /// Host Bluetooth adapter settings.
    pub ble: BleConfig,
    /// Recognised scales.
    pub protocol: ProtocolConfig,
    /// The person standing on the scale.
    pub profile: ProfileConfig,
    /// Body-fat calibration.
    pub calibration: CalibrationConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Subject profile. Leave it empty to only measure weight.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub height_cm: Option<f64>,
    pub age: Option<u8>,
    pub sex: Option<Sex>,
    /// Measurements already taken by this person; `0` marks a first use.
    pub prior_measurements: u32,
}

/// Calibration settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Body-fat percentage points added on a first use.
    pub first_use_offset: f64,
}

impl Config {
    /// Load configuration from `bodyscale.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BODYSCALE_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides looked up through `var` (the process environment in
    /// production). Values that do not parse are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("BODYSCALE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(secs) = var("BODYSCALE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.acquisition.timeout_secs = secs;
        }
        if let Some(height) = var("BODYSCALE_HEIGHT_CM").and_then(|v| v.parse().ok()) {
            self.profile.height_cm = Some(height);
        }
        if let Some(age) = var("BODYSCALE_AGE").and_then(|v| v.parse().ok()) {
            self.profile.age = Some(age);
        }
        if let Some(sex) = var("BODYSCALE_SEX").and_then(|v| v.parse().ok()) {
            self.profile.sex = Some(sex);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.acquisition.validate()?;
        self.protocol.validate()?;
        if self.ble.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "ble.channel_capacity must be non-zero".to_string(),
            ));
        }
        if !self.calibration.first_use_offset.is_finite() {
            return Err(ConfigError::Validation(
                "calibration.first_use_offset must be a number".to_string(),
            ));
        }
        self.profile.to_profile()?;
        Ok(())
    }

    /// The calibration table described by the `[calibration]` section.
    #[must_use]
    pub fn calibration_table(&self) -> CalibrationTable {
        CalibrationTable::identity().with_first_use_offset(self.calibration.first_use_offset)
    }
}

impl ProfileConfig {
    /// Build the profile, or `None` when no field was given at all.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when the profile is only partially filled
    /// in or a value is out of range.
    pub fn to_profile(&self) -> Result<Option<Profile>, ProfileError> {
        if self.height_cm.is_none() && self.age.is_none() && self.sex.is_none() {
            return Ok(None);
        }
        let mut builder = Profile::builder().prior_measurements(self.prior_measurements);
        if let Some(height_cm) = self.height_cm {
            builder = builder.height_cm(height_cm);
        }
        if let Some(age) = self.age {
            builder = builder.age(age);
        }
        if let Some(sex) = self.sex {
            builder = builder.sex(sex);
        }
        builder.build().map(Some)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "bodyscale=info,bodyscale_app=info,bodyscale_adapter_ble=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A tunable is out of range.
    #[error("invalid configuration")]
    Invalid(#[from] InvalidConfig),
    /// The `[profile]` section cannot be used.
    #[error("invalid profile")]
    Profile(#[from] ProfileError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
