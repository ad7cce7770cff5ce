//! Manufacturer-data decoding.
//!
//! Pure functions on raw `&[u8]` slices, no BLE dependency needed.
//!
//! A manufacturer-specific AD structure starts with the 16-bit Bluetooth SIG
//! company identifier (little-endian) followed by vendor bytes. Some stacks
//! hand over that blob as-is, others (e.g. `btleplug`) pre-split it into a
//! `company id → data` map. [`ManufacturerData`] normalises both shapes and
//! keeps the full buffer, since cheap broadcast scales often reuse the
//! company-id slot to carry the reading.

/// A decoded manufacturer-data blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerData {
    company_id: u16,
    bytes: Vec<u8>,
}

impl ManufacturerData {
    /// Decode a blob as transported by the platform.
    ///
    /// Returns `None` when the blob is too short to hold a company id.
    #[must_use]
    pub fn from_blob(blob: &[u8]) -> Option<Self> {
        let [lo, hi, ..] = *blob else {
            return None;
        };
        Some(Self {
            company_id: u16::from_le_bytes([lo, hi]),
            bytes: blob.to_vec(),
        })
    }

    /// Rebuild the blob from a stack that already split off the company id.
    #[must_use]
    pub fn from_company_entry(company_id: u16, data: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(data.len() + 2);
        bytes.extend_from_slice(&company_id.to_le_bytes());
        bytes.extend_from_slice(data);
        Self { company_id, bytes }
    }

    /// The numeric manufacturer identifier.
    #[must_use]
    pub fn company_id(&self) -> u16 {
        self.company_id
    }

    /// The full buffer, company-id bytes included.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Vendor bytes following the company id.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes[2..]
    }

    /// Consume and return the full buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Format bytes as an uppercase hex string for logs (e.g. `"1B58"`).
#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02X}");
        out
    })
}
