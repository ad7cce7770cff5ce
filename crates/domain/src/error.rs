//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors; the domain only knows about
//! invalid profiles and misuse of the stabilization engine.

/// Errors raised when an anthropometric profile cannot be used for
/// metrics derivation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    /// Height outside the supported range.
    #[error("height must be between {min} and {max} cm, got {actual}")]
    HeightOutOfRange {
        /// Smallest accepted height in centimetres.
        min: f64,
        /// Largest accepted height in centimetres.
        max: f64,
        /// Height that was supplied.
        actual: f64,
    },

    /// Age outside the supported range.
    #[error("age must be between {min} and {max} years, got {actual}")]
    AgeOutOfRange {
        /// Youngest accepted age.
        min: u8,
        /// Oldest accepted age.
        max: u8,
        /// Age that was supplied.
        actual: u8,
    },

    /// Sex could not be parsed from text.
    #[error("unrecognised sex `{0}`, expected `male` or `female`")]
    InvalidSex(String),

    /// A required builder field was never set.
    #[error("missing profile field `{0}`")]
    MissingField(&'static str),
}

/// Errors raised by the stabilization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StabilizerError {
    /// The session already reached a terminal phase; call `reset` first.
    #[error("stabilization session is {0}, reset before pushing more samples")]
    Frozen(crate::stabilizer::Phase),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stabilizer::Phase;

    #[test]
    fn should_display_height_out_of_range() {
        let err = ProfileError::HeightOutOfRange {
            min: 50.0,
            max: 250.0,
            actual: 20.0,
        };
        assert_eq!(err.to_string(), "height must be between 50 and 250 cm, got 20");
    }

    #[test]
    fn should_display_missing_field() {
        let err = ProfileError::MissingField("sex");
        assert_eq!(err.to_string(), "missing profile field `sex`");
    }

    #[test]
    fn should_display_frozen_session() {
        let err = StabilizerError::Frozen(Phase::Stable);
        assert_eq!(
            err.to_string(),
            "stabilization session is stable, reset before pushing more samples"
        );
    }
}
