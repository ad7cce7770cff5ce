//! Body-fat calibration adjustments keyed by demographic band.
//!
//! Regression formulas drift for some populations. Rather than hardcoding
//! corrections for individual age/BMI combinations, adjustments live in an
//! explicit table of named bands with documented bounds. The shipped
//! default is the identity (no bands, no first-use offset) until a table
//! has been validated against a reference population.

use std::ops::{Range, RangeInclusive};

use crate::profile::{Profile, Sex};

/// One calibration rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBand {
    /// Human-readable name, surfaced in logs.
    pub name: &'static str,
    /// Restrict to one sex, or `None` for both.
    pub sex: Option<Sex>,
    /// Ages (years) the band applies to.
    pub age: RangeInclusive<u8>,
    /// BMI values the band applies to (half-open).
    pub bmi: Range<f64>,
    /// Percentage points added to the body-fat estimate.
    pub body_fat_offset: f64,
}

impl CalibrationBand {
    /// Whether this band covers the given profile and BMI.
    #[must_use]
    pub fn applies(&self, profile: &Profile, bmi: f64) -> bool {
        self.sex.is_none_or(|sex| sex == profile.sex)
            && self.age.contains(&profile.age)
            && self.bmi.contains(&bmi)
    }
}

/// Ordered set of calibration bands plus the first-use offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationTable {
    bands: Vec<CalibrationBand>,
    first_use_offset: f64,
}

impl CalibrationTable {
    /// The identity table: no adjustment at all.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Add a band. Bands are evaluated in insertion order.
    #[must_use]
    pub fn with_band(mut self, band: CalibrationBand) -> Self {
        self.bands.push(band);
        self
    }

    /// Percentage points added to body fat on a person's very first
    /// measurement (`prior_measurements == 0`).
    #[must_use]
    pub fn with_first_use_offset(mut self, offset: f64) -> Self {
        self.first_use_offset = offset;
        self
    }

    #[must_use]
    pub fn bands(&self) -> &[CalibrationBand] {
        &self.bands
    }

    /// Total body-fat offset for a profile: the first matching band plus the
    /// first-use offset when applicable.
    #[must_use]
    pub fn body_fat_offset(&self, profile: &Profile, bmi: f64) -> f64 {
        let band = self
            .bands
            .iter()
            .find(|band| band.applies(profile, bmi))
            .map_or(0.0, |band| band.body_fat_offset);
        let first_use = if profile.is_first_use() {
            self.first_use_offset
        } else {
            0.0
        };
        band + first_use
    }
}
