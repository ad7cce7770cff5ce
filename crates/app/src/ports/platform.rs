//! Platform port: the Bluetooth stack the acquisition use-case listens to.
//!
//! The core never talks to a BLE stack directly. An adapter crate (e.g.
//! `bodyscale-adapter-ble`) implements [`AdvertisementSource`] and forwards
//! every advertisement it sees into the channel returned by
//! [`start_scan`](AdvertisementSource::start_scan). The platform side only
//! ever enqueues; all session state lives in the consumer.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::PlatformError;

/// One broadcast received from a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Stable device identifier (MAC address on most platforms).
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: Option<i16>,
    /// Manufacturer-specific data blob as transported by the platform.
    pub manufacturer_data: Vec<u8>,
}

/// Power state of the Bluetooth radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unknown,
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// An event delivered by the platform while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Advertisement(Advertisement),
    /// The platform stream failed; no further events will follow.
    Error(String),
}

/// A source of BLE advertisements.
///
/// Implementations must be cheap to share (`Send + Sync`) because the
/// acquisition task calls [`stop_scan`](Self::stop_scan) itself once the
/// weight converged or the timeout fired.
pub trait AdvertisementSource: Send + Sync {
    /// Current power state of the radio.
    fn adapter_state(&self) -> impl Future<Output = Result<AdapterState, PlatformError>> + Send;

    /// Ask the platform for the scanning permission.
    fn request_permissions(
        &self,
    ) -> impl Future<Output = Result<PermissionStatus, PlatformError>> + Send;

    /// Begin scanning and return the receiving end of the event channel.
    ///
    /// Events must be delivered in the order the platform produced them.
    fn start_scan(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<PlatformEvent>, PlatformError>> + Send;

    /// Stop scanning. Must succeed when no scan is running.
    fn stop_scan(&self) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

impl<T: AdvertisementSource> AdvertisementSource for std::sync::Arc<T> {
    fn adapter_state(&self) -> impl Future<Output = Result<AdapterState, PlatformError>> + Send {
        (**self).adapter_state()
    }

    fn request_permissions(
        &self,
    ) -> impl Future<Output = Result<PermissionStatus, PlatformError>> + Send {
        (**self).request_permissions()
    }

    fn start_scan(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<PlatformEvent>, PlatformError>> + Send {
        (**self).start_scan()
    }

    fn stop_scan(&self) -> impl Future<Output = Result<(), PlatformError>> + Send {
        (**self).stop_scan()
    }
}
