//! Acquisition and protocol configuration.

use std::time::Duration;

use serde::Deserialize;

use bodyscale_domain::stabilizer::StabilizerConfig;
use bodyscale_domain::weight::Weight;

use crate::error::InvalidConfig;

/// Address block assigned to the broadcast scales supported out of the box.
pub const DEFAULT_ADDRESS_PREFIX: &str = "ED:67:37";

/// Tunables of one acquisition session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Hard wall-clock limit of a session, in seconds.
    pub timeout_secs: u16,
    /// Samples required before convergence is evaluated.
    pub min_samples: usize,
    /// Trailing window the convergence statistics are computed on.
    pub window_ms: u64,
    /// Largest accepted `max − min` over the window, in kilograms.
    pub spread_tolerance_kg: f64,
    /// Largest accepted half-over-half drift, in kilograms.
    pub trend_tolerance_kg: f64,
    /// Optional address allowlist (e.g. `["ED:67:37:AA:BB:CC"]`).
    ///
    /// When empty, every device recognised by a protocol is accepted.
    pub device_filter: Vec<String>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            min_samples: 10,
            window_ms: 4_000,
            spread_tolerance_kg: 0.10,
            trend_tolerance_kg: 0.05,
            device_filter: Vec::new(),
        }
    }
}

impl AcquisitionConfig {
    /// Session timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }

    /// Build the stabilizer tunables.
    #[must_use]
    pub fn stabilizer(&self) -> StabilizerConfig {
        StabilizerConfig {
            min_samples: self.min_samples,
            window_ms: self.window_ms,
            spread_tolerance: Weight::from_kg(self.spread_tolerance_kg).unwrap_or_default(),
            trend_tolerance_kg: self.trend_tolerance_kg,
        }
    }

    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.timeout_secs == 0 {
            return Err(InvalidConfig {
                field: "timeout_secs",
                reason: "must be non-zero",
            });
        }
        if self.min_samples < 2 {
            return Err(InvalidConfig {
                field: "min_samples",
                reason: "must be at least 2",
            });
        }
        if self.window_ms == 0 {
            return Err(InvalidConfig {
                field: "window_ms",
                reason: "must be non-zero",
            });
        }
        if !(self.spread_tolerance_kg.is_finite() && self.spread_tolerance_kg >= 0.0) {
            return Err(InvalidConfig {
                field: "spread_tolerance_kg",
                reason: "must be a non-negative number",
            });
        }
        if !(self.trend_tolerance_kg.is_finite() && self.trend_tolerance_kg >= 0.0) {
            return Err(InvalidConfig {
                field: "trend_tolerance_kg",
                reason: "must be a non-negative number",
            });
        }
        Ok(())
    }

    /// Check whether the given address passes the device filter.
    #[must_use]
    pub fn passes_filter(&self, address: &str) -> bool {
        if self.device_filter.is_empty() {
            return true;
        }
        self.device_filter
            .iter()
            .any(|f| f.eq_ignore_ascii_case(address))
    }
}

/// Configuration of the built-in broadcast-scale protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Address prefixes (vendor blocks) recognised as scales.
    pub address_prefixes: Vec<String>,
    /// Lightest plausible weight, in kilograms.
    pub min_weight_kg: f64,
    /// Heaviest plausible weight, in kilograms.
    pub max_weight_kg: f64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            address_prefixes: vec![DEFAULT_ADDRESS_PREFIX.to_string()],
            min_weight_kg: 30.0,
            max_weight_kg: 200.0,
        }
    }
}

impl ProtocolConfig {
    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.address_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(InvalidConfig {
                field: "address_prefixes",
                reason: "prefixes must not be empty",
            });
        }
        if Weight::from_kg(self.min_weight_kg).is_none() {
            return Err(InvalidConfig {
                field: "min_weight_kg",
                reason: "must be a non-negative number",
            });
        }
        if Weight::from_kg(self.max_weight_kg).is_none() || self.max_weight_kg <= self.min_weight_kg
        {
            return Err(InvalidConfig {
                field: "max_weight_kg",
                reason: "must be greater than min_weight_kg",
            });
        }
        Ok(())
    }
}
