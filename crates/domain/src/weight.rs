//! Fixed-point body weight with two-decimal (10 g) precision.

use std::fmt;

use serde::{Serialize, Serializer};

/// A body weight stored as hundredths of a kilogram.
///
/// Scales broadcast integer centi-kilograms, so keeping that representation
/// makes spread comparisons exact and guarantees two-decimal rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Weight(u32);

impl Weight {
    /// Build a weight from raw hundredths of a kilogram (e.g. `7000` → 70.00 kg).
    #[must_use]
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    /// Build a weight from kilograms, rounding to the nearest 0.01 kg.
    ///
    /// Returns `None` for negative, non-finite or unrepresentable values.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_kg(kg: f64) -> Option<Self> {
        let hundredths = (kg * 100.0).round();
        if !hundredths.is_finite() || hundredths < 0.0 || hundredths > f64::from(u32::MAX) {
            return None;
        }
        Some(Self(hundredths as u32))
    }

    /// Raw value in hundredths of a kilogram.
    #[must_use]
    pub const fn hundredths(self) -> u32 {
        self.0
    }

    /// Value in kilograms.
    #[must_use]
    pub fn kg(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} kg", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Weight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.kg())
    }
}

/// Round a value to two decimals, the precision every reported weight uses.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_hundredths_to_kg() {
        assert!((Weight::from_hundredths(7000).kg() - 70.0).abs() < f64::EPSILON);
        assert!((Weight::from_hundredths(7012).kg() - 70.12).abs() < 1e-9);
    }

    #[test]
    fn should_round_kg_to_two_decimals() {
        assert_eq!(Weight::from_kg(70.004), Some(Weight::from_hundredths(7000)));
        assert_eq!(Weight::from_kg(70.006), Some(Weight::from_hundredths(7001)));
    }

    #[test]
    fn should_reject_negative_and_non_finite_kg() {
        assert_eq!(Weight::from_kg(-1.0), None);
        assert_eq!(Weight::from_kg(f64::NAN), None);
        assert_eq!(Weight::from_kg(f64::INFINITY), None);
    }

    #[test]
    fn should_display_with_two_decimals() {
        assert_eq!(Weight::from_hundredths(7005).to_string(), "70.05 kg");
        assert_eq!(Weight::from_hundredths(3000).to_string(), "30.00 kg");
    }

    #[test]
    fn should_serialize_as_kilograms() {
        let json = serde_json::to_string(&Weight::from_hundredths(7250)).unwrap();
        assert_eq!(json, "72.5");
    }

    #[test]
    fn should_round2() {
        assert!((round2(22.857_142) - 22.86).abs() < 1e-9);
    }
}
