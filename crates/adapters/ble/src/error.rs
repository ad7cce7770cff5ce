//! BLE adapter error types.

use bodyscale_app::error::PlatformError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found at the configured index.
    #[error("no BLE adapter available at index {0}")]
    NotAvailable(usize),

    /// BLE scan or adapter operation failed.
    #[error("BLE scan error")]
    Scan(#[from] btleplug::Error),
}

impl From<BleError> for PlatformError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::NotAvailable(_) => Self::NoAdapter,
            other => Self::stream(other),
        }
    }
}
