//! BLE adapter configuration.

use serde::Deserialize;

/// Configuration of the btleplug advertisement source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Which host adapter to scan with, in the order btleplug lists them.
    pub adapter_index: usize,
    /// Capacity of the channel between the BLE stack and the session.
    ///
    /// When full, the forwarding task waits; advertisements are never
    /// reordered.
    pub channel_capacity: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            channel_capacity: 64,
        }
    }
}
