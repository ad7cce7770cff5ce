//! Body-composition metrics derived from one converged weight.
//!
//! [`derive`] is a pure function of the weight and the [`Profile`]: no IO,
//! no hidden state, no iterative solving. Everything except body fat is
//! computed from `{weight, height, age, sex}` directly or from the body-fat
//! percentage, in this order:
//!
//! 1. BMI
//! 2. body-fat % (Deurenberg regression + calibration, clamped 8–60 %),
//!    fat mass and lean mass
//! 3. skeletal muscle, from lean mass
//! 4. body water, from the lean fraction
//! 5. visceral fat index
//! 6. bone mass
//! 7. basal metabolic rate (Mifflin–St Jeor)
//! 8. protein %
//! 9. obesity index, from the BMI excess over 25
//! 10. metabolic age

mod calibration;
pub mod status;

pub use calibration::{CalibrationBand, CalibrationTable};
pub use status::{Rated, Status};

use serde::Serialize;

use crate::error::ProfileError;
use crate::profile::Profile;
use crate::weight::Weight;

const BODY_FAT_MIN: f64 = 8.0;
const BODY_FAT_MAX: f64 = 60.0;
const VISCERAL_MIN: f64 = 1.0;
const VISCERAL_MAX: f64 = 30.0;
const METABOLIC_AGE_MIN: f64 = 15.0;
const METABOLIC_AGE_MAX: f64 = 90.0;
const OBESITY_INDEX_MAX: f64 = 100.0;

/// Everything derived from one stable weighing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyComposition {
    pub weight: Weight,
    pub bmi: Rated,
    pub body_fat_percent: Rated,
    pub body_fat_mass_kg: f64,
    pub lean_mass_kg: f64,
    pub muscle_percent: Rated,
    pub muscle_mass_kg: f64,
    pub water_percent: Rated,
    pub water_mass_kg: f64,
    pub visceral_fat: Rated,
    pub bone_mass_kg: Rated,
    pub bmr_kcal: Rated,
    pub metabolic_age: Rated,
    pub protein_percent: Rated,
    pub obesity_index: Rated,
}

/// Derive body composition using the identity calibration.
///
/// # Errors
///
/// Returns a [`ProfileError`] when the profile is outside the supported
/// range.
pub fn derive(weight: Weight, profile: &Profile) -> Result<BodyComposition, ProfileError> {
    derive_with(weight, profile, &CalibrationTable::identity())
}

/// Derive body composition with an explicit calibration table.
///
/// # Errors
///
/// Returns a [`ProfileError`] when the profile is outside the supported
/// range.
pub fn derive_with(
    weight: Weight,
    profile: &Profile,
    calibration: &CalibrationTable,
) -> Result<BodyComposition, ProfileError> {
    profile.validate()?;

    let w = weight.kg();
    let sex = profile.sex;
    let age = f64::from(profile.age);

    let bmi = w / profile.height_m().powi(2);

    let male = sex.pick(1.0, 0.0);
    let body_fat = (1.20 * bmi + 0.23 * age - 10.8 * male - 5.4
        + calibration.body_fat_offset(profile, bmi))
    .clamp(BODY_FAT_MIN, BODY_FAT_MAX);
    let fat_mass = w * body_fat / 100.0;
    let lean_mass = w - fat_mass;

    let muscle_mass = lean_mass * sex.pick(0.58, 0.52);
    let muscle_percent = muscle_mass / w * 100.0;

    let water_percent = sex.pick(73.2, 72.5) * lean_mass / w;
    let water_mass = w * water_percent / 100.0;

    let visceral = if body_fat < 14.0 {
        VISCERAL_MIN
    } else {
        (body_fat - 11.5).clamp(VISCERAL_MIN, VISCERAL_MAX)
    };

    let bone_mass = w * sex.pick(0.042, 0.037);

    let bmr = 10.0 * w + 6.25 * profile.height_cm - 5.0 * age + sex.pick(5.0, -161.0);

    let protein = sex.pick(18.0, 16.0);

    let obesity = obesity_index(bmi);

    let metabolic_age =
        (age + (body_fat - 18.0) * 0.8).clamp(METABOLIC_AGE_MIN, METABOLIC_AGE_MAX);

    Ok(BodyComposition {
        weight,
        bmi: Rated::new(round1(bmi), status::bmi(bmi, profile.is_minor())),
        body_fat_percent: Rated::new(round1(body_fat), status::body_fat(body_fat, sex)),
        body_fat_mass_kg: round1(fat_mass),
        lean_mass_kg: round1(lean_mass),
        muscle_percent: Rated::new(round1(muscle_percent), status::muscle(muscle_percent, sex)),
        muscle_mass_kg: round1(muscle_mass),
        water_percent: Rated::new(round1(water_percent), status::water(water_percent, sex)),
        water_mass_kg: round1(water_mass),
        visceral_fat: Rated::new(round1(visceral), status::visceral_fat(visceral)),
        bone_mass_kg: Rated::new(round1(bone_mass), status::bone_mass(bone_mass, w, sex)),
        bmr_kcal: Rated::new(bmr.round(), status::bmr(bmr, w, sex)),
        metabolic_age: Rated::new(
            metabolic_age.round(),
            status::metabolic_age(metabolic_age.round(), profile.age),
        ),
        protein_percent: Rated::new(protein, status::protein(protein)),
        obesity_index: Rated::new(round1(obesity), status::obesity_index(obesity)),
    })
}

/// Piecewise-linear score of the BMI excess over 25: flat at zero below,
/// 4 points per BMI unit up to 30, 6 points per unit beyond, capped at 100.
fn obesity_index(bmi: f64) -> f64 {
    let excess = bmi - 25.0;
    let score = if excess <= 0.0 {
        0.0
    } else if excess <= 5.0 {
        excess * 4.0
    } else {
        20.0 + (excess - 5.0) * 6.0
    };
    score.min(OBESITY_INDEX_MAX)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
