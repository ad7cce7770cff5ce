//! Scale protocol descriptors and the registry that picks one per device.
//!
//! Devices are recognised **by address prefix only** (the vendor's assigned
//! block), never by payload, name or signal strength. A device from an
//! unrelated vendor is therefore ignored instead of being mis-decoded, and a
//! payload that fails to decode is reported as a [`DecodeMismatch`] rather
//! than as "unknown device".
//!
//! ## Currently supported formats
//!
//! | Protocol | Recognised by | Payload | Scale |
//! |----------|---------------|---------|-------|
//! | `broadcast-scale` | configured address prefixes | bytes 0–1, u16 BE | ÷100 → kg |

use std::fmt;

use bodyscale_domain::weight::Weight;

use crate::config::ProtocolConfig;
use crate::error::DecodeMismatch;
use crate::payload::ManufacturerData;
use crate::ports::Advertisement;

/// A scale protocol: how to recognise a device and decode its broadcasts.
///
/// Adding a vendor means adding an implementation to the registry; the
/// acquisition loop and the stabilizer stay untouched.
pub trait ScaleProtocol: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the device address belongs to this protocol.
    fn matches(&self, address: &str) -> bool;

    /// Decode the manufacturer-data buffer into a weight.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeMismatch`] when the payload is too short or the
    /// weight is not plausible.
    fn decode(&self, payload: &[u8]) -> Result<Weight, DecodeMismatch>;

    /// Whether the device only broadcasts (never accepts connections).
    fn broadcast_only(&self) -> bool {
        true
    }
}

/// Inclusive range of physically plausible body weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlausibleRange {
    pub min: Weight,
    pub max: Weight,
}

impl PlausibleRange {
    #[must_use]
    pub fn contains(&self, weight: Weight) -> bool {
        (self.min..=self.max).contains(&weight)
    }
}

impl Default for PlausibleRange {
    fn default() -> Self {
        Self {
            min: Weight::from_hundredths(3_000),
            max: Weight::from_hundredths(20_000),
        }
    }
}

/// Broadcast-only scales that put the weight in the first two bytes of the
/// manufacturer data, big-endian, in hundredths of a kilogram.
///
/// | Offset | Field | Type |
/// |--------|-------|------|
/// | 0–1 | Weight | u16 BE, x0.01 kg |
///
/// No other field (fat, muscle, …) is broadcast; those are derived
/// downstream from the converged weight.
#[derive(Debug, Clone)]
pub struct BroadcastScaleProtocol {
    prefixes: Vec<String>,
    range: PlausibleRange,
}

impl BroadcastScaleProtocol {
    pub const NAME: &'static str = "broadcast-scale";
    const WEIGHT_LEN: usize = 2;

    /// Create a protocol recognising the given address prefixes.
    #[must_use]
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>, range: PlausibleRange) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.into().trim().to_ascii_uppercase())
                .collect(),
            range,
        }
    }

    /// Build the protocol from its configuration section.
    #[must_use]
    pub fn from_config(config: &ProtocolConfig) -> Self {
        let defaults = PlausibleRange::default();
        let range = PlausibleRange {
            min: Weight::from_kg(config.min_weight_kg).unwrap_or(defaults.min),
            max: Weight::from_kg(config.max_weight_kg).unwrap_or(defaults.max),
        };
        Self::new(config.address_prefixes.iter().map(String::as_str), range)
    }
}

impl ScaleProtocol for BroadcastScaleProtocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn matches(&self, address: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            address
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
    }

    fn decode(&self, payload: &[u8]) -> Result<Weight, DecodeMismatch> {
        let [hi, lo, ..] = *payload else {
            return Err(DecodeMismatch::TooShort {
                protocol: Self::NAME,
                expected: Self::WEIGHT_LEN,
                actual: payload.len(),
            });
        };
        let weight = Weight::from_hundredths(u32::from(u16::from_be_bytes([hi, lo])));
        if !self.range.contains(weight) {
            return Err(DecodeMismatch::OutOfRange {
                weight,
                min: self.range.min,
                max: self.range.max,
            });
        }
        Ok(weight)
    }
}

/// Fixed, ordered list of protocols. Immutable once built.
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    protocols: Vec<Box<dyn ScaleProtocol>>,
}

impl ProtocolRegistry {
    /// Create a registry; earlier protocols take priority.
    #[must_use]
    pub fn new(protocols: Vec<Box<dyn ScaleProtocol>>) -> Self {
        Self { protocols }
    }

    /// The registry of built-in protocols, configured from `config`.
    #[must_use]
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(vec![Box::new(BroadcastScaleProtocol::from_config(config))])
    }

    /// Registered protocols in priority order.
    pub fn protocols(&self) -> impl Iterator<Item = &dyn ScaleProtocol> + '_ {
        self.protocols.iter().map(AsRef::as_ref)
    }

    /// The first protocol whose address matcher accepts the advertisement.
    #[must_use]
    pub fn identify(&self, advertisement: &Advertisement) -> Option<&dyn ScaleProtocol> {
        self.protocols()
            .find(|protocol| protocol.matches(&advertisement.address))
    }

    /// Decode an advertisement already identified as `protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeMismatch`] when there is no manufacturer data or the
    /// protocol rejects the payload.
    pub fn decode(
        protocol: &dyn ScaleProtocol,
        advertisement: &Advertisement,
    ) -> Result<Weight, DecodeMismatch> {
        let data = ManufacturerData::from_blob(&advertisement.manufacturer_data)
            .ok_or(DecodeMismatch::MissingData)?;
        protocol.decode(data.bytes())
    }
}

impl Default for BroadcastScaleProtocol {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}
