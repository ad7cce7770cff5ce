//! Stabilization engine: decides when a stream of noisy weight samples has
//! settled into one trustworthy value.
//!
//! ## Algorithm
//!
//! Every pushed sample is appended to the session buffer. Once at least
//! [`StabilizerConfig::min_samples`] samples were collected, the engine looks
//! at the samples captured within the trailing [`StabilizerConfig::window_ms`]
//! of the latest one and computes two statistics over that window:
//!
//! - **spread**: `max − min`, catches high-frequency jitter;
//! - **trend**: `|mean(second half) − mean(first half)|`, catches a slow
//!   monotonic drift (someone still settling on the plate) that a pure
//!   spread or variance check would let through.
//!
//! The window is time-based so it adapts to whatever broadcast rate the
//! scale uses. When both statistics are inside their tolerances the mean of
//! the window becomes the converged weight and the session freezes until
//! [`Stabilizer::reset`] is called.
//!
//! Samples are assumed to arrive in capture order; the engine does not
//! reorder or deduplicate.

use std::fmt;

use serde::Serialize;

use crate::error::StabilizerError;
use crate::sample::WeightSample;
use crate::weight::{Weight, round2};

const TREND_EPSILON: f64 = 1e-9;
/// Stabilizing progress never reaches 100 % before the session is stable.
const MAX_UNSTABLE_PROGRESS: f64 = 0.99;

/// Tunables of the convergence predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerConfig {
    /// Samples required before any analysis happens, and inside the window.
    pub min_samples: usize,
    /// Trailing time window, relative to the latest sample.
    pub window_ms: u64,
    /// Largest accepted `max − min` over the window.
    pub spread_tolerance: Weight,
    /// Largest accepted half-over-half mean difference, in kilograms.
    pub trend_tolerance_kg: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            window_ms: 4_000,
            spread_tolerance: Weight::from_hundredths(10),
            trend_tolerance_kg: 0.05,
        }
    }
}

/// Lifecycle phase of a stabilization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Collecting,
    Stabilizing,
    Stable,
    TimedOut,
    Failed,
}

impl Phase {
    /// Whether no more samples will be accepted until a reset.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stable | Self::TimedOut | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collecting => f.write_str("collecting"),
            Self::Stabilizing => f.write_str("stabilizing"),
            Self::Stable => f.write_str("stable"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Why the window has not converged yet.
///
/// One criterion is reported at a time. When both the spread and the trend
/// are out of tolerance, [`SpreadTooWide`](Self::SpreadTooWide) wins:
/// [`Drifting`](Self::Drifting) means the spread is already acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnstableReason {
    /// The trailing window holds fewer samples than required.
    WaitingForReadings { in_window: usize, required: usize },
    /// Samples disagree by more than the spread tolerance.
    SpreadTooWide { spread_kg: f64, tolerance_kg: f64 },
    /// The second half of the window moved away from the first half.
    Drifting { trend_kg: f64, tolerance_kg: f64 },
}

impl fmt::Display for UnstableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForReadings { .. } => f.write_str("waiting for more readings"),
            Self::SpreadTooWide {
                spread_kg,
                tolerance_kg,
            } => write!(f, "readings vary by {spread_kg:.2} kg (max {tolerance_kg:.2} kg)"),
            Self::Drifting {
                trend_kg,
                tolerance_kg,
            } => write!(f, "weight still drifting by {trend_kg:.2} kg (max {tolerance_kg:.2} kg)"),
        }
    }
}

/// The converged measurement of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Convergence {
    /// Mean of the window, rounded to 0.01 kg.
    pub weight: Weight,
    /// All samples accumulated since the last reset.
    pub sample_count: usize,
    /// Samples inside the window the decision was taken on.
    pub window_count: usize,
    pub spread_kg: f64,
    pub trend_kg: f64,
}

/// Result of pushing one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Assessment {
    Collecting {
        count: usize,
        threshold: usize,
        progress: f64,
    },
    Stabilizing {
        reason: UnstableReason,
        progress: f64,
        live_weight: Option<Weight>,
    },
    Stable(Convergence),
}

impl Assessment {
    /// The phase this assessment moved the session into.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Collecting { .. } => Phase::Collecting,
            Self::Stabilizing { .. } => Phase::Stabilizing,
            Self::Stable(_) => Phase::Stable,
        }
    }
}

/// Window statistics.
#[derive(Debug, Clone, Copy)]
struct WindowStats {
    count: usize,
    mean_kg: f64,
    spread: Weight,
    trend_kg: f64,
}

impl WindowStats {
    fn compute(window: &[WeightSample]) -> Option<Self> {
        let (min, max) = window.iter().fold(None, |acc, s| match acc {
            None => Some((s.weight, s.weight)),
            Some((lo, hi)) => Some((lo.min(s.weight), hi.max(s.weight))),
        })?;
        let mid = window.len() / 2;
        let (first, second) = window.split_at(mid);
        let trend_kg = if first.is_empty() {
            0.0
        } else {
            (mean_kg(second) - mean_kg(first)).abs()
        };
        Some(Self {
            count: window.len(),
            mean_kg: mean_kg(window),
            spread: Weight::from_hundredths(max.hundredths() - min.hundredths()),
            trend_kg,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_kg(samples: &[WeightSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: u64 = samples.iter().map(|s| u64::from(s.weight.hundredths())).sum();
    total as f64 / samples.len() as f64 / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 1.0;
    }
    (part as f64 / whole as f64).min(1.0)
}

fn closeness(tolerance: f64, value: f64) -> f64 {
    if value <= tolerance {
        1.0
    } else {
        tolerance / value
    }
}

/// Accumulates samples of one acquisition session and classifies them.
#[derive(Debug, Clone, Default)]
pub struct Stabilizer {
    config: StabilizerConfig,
    samples: Vec<WeightSample>,
    phase: Phase,
    convergence: Option<Convergence>,
}

impl Stabilizer {
    /// Create an empty session using the given tunables.
    #[must_use]
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
            phase: Phase::Collecting,
            convergence: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Samples accumulated since the last reset, in arrival order.
    #[must_use]
    pub fn samples(&self) -> &[WeightSample] {
        &self.samples
    }

    /// The converged result, once [`Phase::Stable`] was reached.
    #[must_use]
    pub fn convergence(&self) -> Option<&Convergence> {
        self.convergence.as_ref()
    }

    /// The tunables this engine runs with.
    #[must_use]
    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Drop every sample and go back to [`Phase::Collecting`].
    pub fn reset(&mut self) {
        self.samples.clear();
        self.phase = Phase::Collecting;
        self.convergence = None;
    }

    /// Freeze the session because the acquisition timed out.
    pub fn mark_timed_out(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = Phase::TimedOut;
        }
    }

    /// Freeze the session because the platform stream failed.
    pub fn mark_failed(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = Phase::Failed;
        }
    }

    /// Append a sample and re-evaluate convergence.
    ///
    /// # Errors
    ///
    /// Returns [`StabilizerError::Frozen`] when the session already reached a
    /// terminal phase.
    pub fn push(&mut self, sample: WeightSample) -> Result<Assessment, StabilizerError> {
        if self.phase.is_terminal() {
            return Err(StabilizerError::Frozen(self.phase));
        }
        self.samples.push(sample);

        let assessment = self.assess();
        if let Assessment::Stable(convergence) = &assessment {
            self.convergence = Some(*convergence);
        }
        self.phase = assessment.phase();
        Ok(assessment)
    }

    fn assess(&self) -> Assessment {
        let threshold = self.config.min_samples;
        let count = self.samples.len();
        if count < threshold {
            return Assessment::Collecting {
                count,
                threshold,
                progress: fraction(count, threshold),
            };
        }

        let window = self.window();
        let Some(stats) = WindowStats::compute(window).filter(|s| s.count >= threshold) else {
            return Assessment::Stabilizing {
                reason: UnstableReason::WaitingForReadings {
                    in_window: window.len(),
                    required: threshold,
                },
                progress: fraction(window.len(), threshold) * MAX_UNSTABLE_PROGRESS,
                live_weight: Weight::from_kg(mean_kg(window)),
            };
        };

        let spread_kg = stats.spread.kg();
        let tolerance_kg = self.config.spread_tolerance.kg();
        let spread_ok = stats.spread <= self.config.spread_tolerance;
        let trend_ok = stats.trend_kg <= self.config.trend_tolerance_kg + TREND_EPSILON;

        if spread_ok && trend_ok {
            return Assessment::Stable(Convergence {
                weight: Weight::from_kg(stats.mean_kg).unwrap_or(sample_weight(window)),
                sample_count: count,
                window_count: stats.count,
                spread_kg: round2(spread_kg),
                trend_kg: round2(stats.trend_kg),
            });
        }

        let reason = if spread_ok {
            UnstableReason::Drifting {
                trend_kg: round2(stats.trend_kg),
                tolerance_kg: self.config.trend_tolerance_kg,
            }
        } else {
            UnstableReason::SpreadTooWide {
                spread_kg: round2(spread_kg),
                tolerance_kg,
            }
        };
        let progress = closeness(tolerance_kg, spread_kg)
            .min(closeness(self.config.trend_tolerance_kg, stats.trend_kg))
            .clamp(0.0, MAX_UNSTABLE_PROGRESS);

        Assessment::Stabilizing {
            reason,
            progress,
            live_weight: Weight::from_kg(stats.mean_kg),
        }
    }

    /// The suffix of samples captured within the window of the latest one.
    fn window(&self) -> &[WeightSample] {
        let Some(latest) = self.samples.last() else {
            return &[];
        };
        let start = self
            .samples
            .iter()
            .rposition(|s| latest.offset_ms.saturating_sub(s.offset_ms) > self.config.window_ms)
            .map_or(0, |idx| idx + 1);
        &self.samples[start..]
    }
}

fn sample_weight(window: &[WeightSample]) -> Weight {
    window.last().map(|s| s.weight).unwrap_or_default()
}
