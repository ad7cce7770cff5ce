//! Categorical status attached to every derived metric.

use serde::Serialize;

use crate::profile::Sex;

/// How a metric compares to its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Low,
    Healthy,
    High,
    Obese,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Healthy => f.write_str("healthy"),
            Self::High => f.write_str("high"),
            Self::Obese => f.write_str("obese"),
        }
    }
}

/// A derived value with its status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rated {
    pub value: f64,
    pub status: Status,
}

impl Rated {
    #[must_use]
    pub fn new(value: f64, status: Status) -> Self {
        Self { value, status }
    }
}

/// Upper bound of the healthy BMI band for adults.
pub const BMI_HEALTHY_MAX_ADULT: f64 = 25.0;
/// Upper bound of the healthy BMI band for people under 18.
pub const BMI_HEALTHY_MAX_MINOR: f64 = 24.0;

/// Classify with three ascending cut-offs: `< low` → low, `< healthy` →
/// healthy, `< high` → high, otherwise obese.
fn banded(value: f64, low: f64, healthy: f64, high: f64) -> Status {
    if value < low {
        Status::Low
    } else if value < healthy {
        Status::Healthy
    } else if value < high {
        Status::High
    } else {
        Status::Obese
    }
}

/// `< low` → low, `<= high` → healthy, otherwise high.
fn ranged(value: f64, low: f64, high: f64) -> Status {
    if value < low {
        Status::Low
    } else if value <= high {
        Status::Healthy
    } else {
        Status::High
    }
}

#[must_use]
pub fn bmi(bmi: f64, minor: bool) -> Status {
    let upper = if minor {
        BMI_HEALTHY_MAX_MINOR
    } else {
        BMI_HEALTHY_MAX_ADULT
    };
    banded(bmi, 18.5, upper, 30.0)
}

#[must_use]
pub fn body_fat(percent: f64, sex: Sex) -> Status {
    match sex {
        Sex::Male => banded(percent, 10.0, 20.0, 25.0),
        Sex::Female => banded(percent, 20.0, 30.0, 35.0),
    }
}

#[must_use]
pub fn muscle(percent: f64, sex: Sex) -> Status {
    match sex {
        Sex::Male => ranged(percent, 40.0, 50.0),
        Sex::Female => ranged(percent, 30.0, 40.0),
    }
}

#[must_use]
pub fn water(percent: f64, sex: Sex) -> Status {
    match sex {
        Sex::Male => ranged(percent, 50.0, 65.0),
        Sex::Female => ranged(percent, 45.0, 60.0),
    }
}

#[must_use]
pub fn visceral_fat(index: f64) -> Status {
    if index <= 9.0 {
        Status::Healthy
    } else if index <= 14.0 {
        Status::High
    } else {
        Status::Obese
    }
}

/// Bone mass is rated against a minimum that grows with body weight.
#[must_use]
pub fn bone_mass(mass_kg: f64, weight_kg: f64, sex: Sex) -> Status {
    let minimum = match sex {
        Sex::Male if weight_kg < 60.0 => 2.5,
        Sex::Male if weight_kg < 75.0 => 2.9,
        Sex::Male => 3.2,
        Sex::Female if weight_kg < 45.0 => 1.8,
        Sex::Female if weight_kg < 60.0 => 2.2,
        Sex::Female => 2.5,
    };
    if mass_kg < minimum {
        Status::Low
    } else {
        Status::Healthy
    }
}

/// BMR is rated against a per-kilogram reference intake.
#[must_use]
pub fn bmr(kcal: f64, weight_kg: f64, sex: Sex) -> Status {
    let reference = weight_kg * sex.pick(22.0, 20.0);
    if kcal < reference {
        Status::Low
    } else {
        Status::Healthy
    }
}

#[must_use]
pub fn protein(percent: f64) -> Status {
    ranged(percent, 16.0, 20.0)
}

#[must_use]
pub fn obesity_index(index: f64) -> Status {
    if index < 10.0 {
        Status::Healthy
    } else if index < 20.0 {
        Status::High
    } else {
        Status::Obese
    }
}

#[must_use]
pub fn metabolic_age(metabolic: f64, actual: u8) -> Status {
    if metabolic <= f64::from(actual) {
        Status::Healthy
    } else {
        Status::High
    }
}
