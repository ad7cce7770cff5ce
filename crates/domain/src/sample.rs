//! Raw weight samples decoded from scale advertisements.

use serde::Serialize;

use crate::time::{Timestamp, now};
use crate::weight::Weight;

/// One decoded weight reading.
///
/// Samples are immutable once created and are only ever appended to a
/// stabilization session buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSample {
    /// Monotonically increasing id within an acquisition session.
    pub sequence: u64,
    /// Decoded weight.
    pub weight: Weight,
    /// Milliseconds elapsed since the acquisition session started.
    ///
    /// The stabilization window is computed on this monotonic offset, never
    /// on the wall-clock [`captured_at`](Self::captured_at).
    pub offset_ms: u64,
    /// Wall-clock capture time, for display and logging.
    pub captured_at: Timestamp,
}

impl WeightSample {
    /// Create a sample captured now.
    #[must_use]
    pub fn new(sequence: u64, weight: Weight, offset_ms: u64) -> Self {
        Self {
            sequence,
            weight,
            offset_ms,
            captured_at: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_fields_given_at_construction() {
        let sample = WeightSample::new(3, Weight::from_hundredths(7000), 900);
        assert_eq!(sample.sequence, 3);
        assert_eq!(sample.weight.hundredths(), 7000);
        assert_eq!(sample.offset_ms, 900);
    }

    #[test]
    fn should_serialize_weight_as_kilograms() {
        let sample = WeightSample::new(1, Weight::from_hundredths(7050), 0);
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["weight"], serde_json::json!(70.5));
        assert_eq!(json["sequence"], serde_json::json!(1));
    }
}
