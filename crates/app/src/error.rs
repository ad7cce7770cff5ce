//! Acquisition error types.

use bodyscale_domain::weight::Weight;

/// Errors reported by a platform [`AdvertisementSource`](crate::ports::AdvertisementSource).
///
/// Adapter crates convert their own errors into this type so the
/// acquisition use-case never sees a BLE-stack specific error.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// No Bluetooth adapter is present on the host.
    #[error("no bluetooth adapter available")]
    NoAdapter,

    /// The platform stream failed.
    #[error("platform stream error")]
    Stream(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PlatformError {
    /// Wrap any adapter-specific error as a stream failure.
    pub fn stream(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Stream(Box::new(err))
    }
}

/// Errors returned synchronously by
/// [`AcquisitionSession::start`](crate::acquisition::AcquisitionSession::start).
///
/// Timeouts and mid-scan failures are not errors of `start`: they are
/// delivered once through the status callback.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// The user did not grant the Bluetooth scanning permission.
    #[error("bluetooth permission denied")]
    PermissionDenied,

    /// The Bluetooth radio is not powered on.
    #[error("bluetooth adapter is off")]
    AdapterOff,

    /// The platform failed while checking preconditions or starting the scan.
    #[error("failed to start the advertisement stream")]
    Platform(#[from] PlatformError),
}

/// Why an advertisement from a recognised device did not yield a sample.
///
/// This is expected noise (a scale idling at zero, a truncated broadcast)
/// and is dropped silently by the acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeMismatch {
    /// The advertisement carried no manufacturer data at all.
    #[error("advertisement carries no manufacturer data")]
    MissingData,

    /// The payload is too short for the protocol.
    #[error("{protocol} payload must be at least {expected} bytes, got {actual}")]
    TooShort {
        /// Protocol name.
        protocol: &'static str,
        /// Minimum byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The decoded weight is not physically plausible.
    #[error("decoded {weight} outside plausible range {min}..={max}")]
    OutOfRange {
        /// Decoded weight.
        weight: Weight,
        /// Lightest accepted weight.
        min: Weight,
        /// Heaviest accepted weight.
        max: Weight,
    },
}

/// A configuration value that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid `{field}`: {reason}")]
pub struct InvalidConfig {
    /// Offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: &'static str,
}
