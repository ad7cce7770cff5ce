//! Anthropometric profile of the person standing on the scale.

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Shortest height accepted by the metric formulas, in centimetres.
pub const MIN_HEIGHT_CM: f64 = 50.0;
/// Tallest height accepted by the metric formulas, in centimetres.
pub const MAX_HEIGHT_CM: f64 = 250.0;
/// Youngest age accepted by the metric formulas.
pub const MIN_AGE: u8 = 5;
/// Oldest age accepted by the metric formulas.
pub const MAX_AGE: u8 = 120;

/// Biological sex, used only to pick formula coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Pick the male or female variant of a coefficient.
    #[must_use]
    pub fn pick<T>(self, male: T, female: T) -> T {
        match self {
            Self::Male => male,
            Self::Female => female,
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => f.write_str("male"),
            Self::Female => f.write_str("female"),
        }
    }
}

impl std::str::FromStr for Sex {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => Err(ProfileError::InvalidSex(s.to_string())),
        }
    }
}

/// The subject's anthropometric data. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub height_cm: f64,
    pub age: u8,
    pub sex: Sex,
    /// Number of measurements already recorded for this person; `0` marks a
    /// first use and enables the first-use calibration offset.
    #[serde(default)]
    pub prior_measurements: u32,
}

impl Profile {
    /// Create a builder for constructing a [`Profile`].
    #[must_use]
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    /// Check that the profile lies inside the range the formulas support.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::HeightOutOfRange`] or
    /// [`ProfileError::AgeOutOfRange`].
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&self.height_cm) {
            return Err(ProfileError::HeightOutOfRange {
                min: MIN_HEIGHT_CM,
                max: MAX_HEIGHT_CM,
                actual: self.height_cm,
            });
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(ProfileError::AgeOutOfRange {
                min: MIN_AGE,
                max: MAX_AGE,
                actual: self.age,
            });
        }
        Ok(())
    }

    /// Height in metres.
    #[must_use]
    pub fn height_m(&self) -> f64 {
        self.height_cm / 100.0
    }

    /// Whether this is the person's first measurement.
    #[must_use]
    pub fn is_first_use(&self) -> bool {
        self.prior_measurements == 0
    }

    /// Whether the person is under 18.
    #[must_use]
    pub fn is_minor(&self) -> bool {
        self.age < 18
    }
}

/// Step-by-step builder for [`Profile`].
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    height_cm: Option<f64>,
    age: Option<u8>,
    sex: Option<Sex>,
    prior_measurements: u32,
}

impl ProfileBuilder {
    #[must_use]
    pub fn height_cm(mut self, height_cm: f64) -> Self {
        self.height_cm = Some(height_cm);
        self
    }

    #[must_use]
    pub fn age(mut self, age: u8) -> Self {
        self.age = Some(age);
        self
    }

    #[must_use]
    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    #[must_use]
    pub fn prior_measurements(mut self, count: u32) -> Self {
        self.prior_measurements = count;
        self
    }

    /// Consume the builder, validate, and return a [`Profile`].
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::MissingField`] when height, age or sex was not
    /// set, or a range error from [`Profile::validate`].
    pub fn build(self) -> Result<Profile, ProfileError> {
        let profile = Profile {
            height_cm: self
                .height_cm
                .ok_or(ProfileError::MissingField("height_cm"))?,
            age: self.age.ok_or(ProfileError::MissingField("age"))?,
            sex: self.sex.ok_or(ProfileError::MissingField("sex"))?,
            prior_measurements: self.prior_measurements,
        };
        profile.validate()?;
        Ok(profile)
    }
}
