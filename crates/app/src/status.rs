//! Status updates delivered to the caller of an acquisition session.

use serde::Serialize;

use bodyscale_domain::id::SessionId;
use bodyscale_domain::metrics::BodyComposition;
use bodyscale_domain::stabilizer::{Assessment, Convergence, UnstableReason};
use bodyscale_domain::weight::Weight;

/// One status update.
///
/// `Stable`, `Timeout` and `Error` are final: each session reports exactly
/// one of them and nothing after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionStatus {
    /// Still gathering the minimum number of samples.
    Collecting { count: usize, threshold: usize },
    /// Enough samples, but the readings have not settled yet.
    Stabilizing {
        reason: UnstableReason,
        live_weight: Option<Weight>,
        progress: f64,
    },
    /// The weight converged.
    Stable {
        session_id: SessionId,
        weight: Weight,
        /// Derived composition, `None` when no profile was set.
        result: Option<BodyComposition>,
        sample_count: usize,
        spread_kg: f64,
        trend_kg: f64,
    },
    /// No convergence before the session deadline.
    Timeout,
    /// The platform stream failed mid-scan.
    Error { message: String },
}

impl AcquisitionStatus {
    /// Whether this status ends the session.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Stable { .. } | Self::Timeout | Self::Error { .. }
        )
    }

    /// Build the final status of a converged session.
    #[must_use]
    pub fn stable(
        session_id: SessionId,
        convergence: &Convergence,
        result: Option<BodyComposition>,
    ) -> Self {
        Self::Stable {
            session_id,
            weight: convergence.weight,
            result,
            sample_count: convergence.sample_count,
            spread_kg: convergence.spread_kg,
            trend_kg: convergence.trend_kg,
        }
    }

    /// Map an in-progress assessment; `None` for a stable one, which is
    /// reported through [`AcquisitionStatus::stable`] instead.
    #[must_use]
    pub fn in_progress(assessment: &Assessment) -> Option<Self> {
        match *assessment {
            Assessment::Collecting {
                count, threshold, ..
            } => Some(Self::Collecting { count, threshold }),
            Assessment::Stabilizing {
                reason,
                progress,
                live_weight,
            } => Some(Self::Stabilizing {
                reason,
                live_weight,
                progress,
            }),
            Assessment::Stable(_) => None,
        }
    }
}
