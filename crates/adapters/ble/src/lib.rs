//! # bodyscale-adapter-ble
//!
//! BLE adapter: implements the acquisition [`AdvertisementSource`] port on
//! top of `btleplug`.
//!
//! ## How it works
//!
//! Broadcast scales never accept connections: every reading is pushed in
//! the manufacturer-specific data of an advertisement. This adapter starts
//! a passive scan, and a background task forwards every
//! manufacturer-data advertisement into the session channel. Protocol
//! matching and decoding happen in `bodyscale-app`.
//!
//! ## Platform notes
//!
//! Desktop stacks have no runtime permission prompt: access is decided by
//! the OS (D-Bus policy on Linux, the Bluetooth privacy setting on macOS).
//! [`request_permissions`](AdvertisementSource::request_permissions)
//! therefore reports `Granted`, and a refusal surfaces as a scan error.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `bodyscale-app` only.

mod config;
mod error;
mod scanner;

pub use config::BleConfig;
pub use error::BleError;

use btleplug::api::{Central, CentralState, Manager as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use bodyscale_app::error::PlatformError;
use bodyscale_app::ports::{AdapterState, AdvertisementSource, PermissionStatus, PlatformEvent};

/// A running scan: the adapter it runs on and the forwarding task.
struct ActiveScan {
    central: Adapter,
    task: JoinHandle<()>,
}

impl Drop for ActiveScan {
    fn drop(&mut self) {
        // A dropped `JoinHandle` only detaches the task.
        self.task.abort();
    }
}

/// Advertisement source backed by the host's Bluetooth adapter.
pub struct BleAdvertisementSource {
    config: BleConfig,
    scan: Mutex<Option<ActiveScan>>,
}

impl BleAdvertisementSource {
    /// Create a source; no Bluetooth call happens until it is used.
    #[must_use]
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            scan: Mutex::new(None),
        }
    }

    async fn central(&self) -> Result<Adapter, BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        adapters
            .into_iter()
            .nth(self.config.adapter_index)
            .ok_or(BleError::NotAvailable(self.config.adapter_index))
    }

    async fn open_scan(&self) -> Result<mpsc::Receiver<PlatformEvent>, BleError> {
        let mut scan = self.scan.lock().await;
        if let Some(previous) = scan.take() {
            halt(previous).await?;
        }

        let central = self.central().await?;
        let events = central.events().await?;
        central.start_scan(ScanFilter::default()).await?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let task = tokio::spawn(scanner::forward_advertisements(central.clone(), events, tx));
        *scan = Some(ActiveScan { central, task });

        tracing::info!(adapter_index = self.config.adapter_index, "BLE scan started");
        Ok(rx)
    }
}

impl Drop for BleAdvertisementSource {
    fn drop(&mut self) {
        let Some(scan) = self.scan.get_mut().take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = halt(scan).await {
                        tracing::warn!(%err, "failed to stop BLE scan on drop");
                    }
                });
            }
            Err(_) => tracing::warn!("BLE source dropped outside a runtime, scan left running"),
        }
    }
}

async fn halt(scan: ActiveScan) -> Result<(), BleError> {
    scan.task.abort();
    scan.central.stop_scan().await?;
    tracing::info!("BLE scan stopped");
    Ok(())
}

impl AdvertisementSource for BleAdvertisementSource {
    async fn adapter_state(&self) -> Result<AdapterState, PlatformError> {
        let central = self.central().await?;
        let state = central.adapter_state().await.map_err(BleError::from)?;
        Ok(match state {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            _ => AdapterState::Unknown,
        })
    }

    async fn request_permissions(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(PermissionStatus::Granted)
    }

    async fn start_scan(&self) -> Result<mpsc::Receiver<PlatformEvent>, PlatformError> {
        Ok(self.open_scan().await?)
    }

    async fn stop_scan(&self) -> Result<(), PlatformError> {
        let Some(scan) = self.scan.lock().await.take() else {
            return Ok(());
        };
        Ok(halt(scan).await?)
    }
}
