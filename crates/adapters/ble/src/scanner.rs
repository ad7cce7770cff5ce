//! Forwarding loop: turns btleplug central events into [`PlatformEvent`]s.
//!
//! The loop never interprets payloads: every manufacturer-data entry is
//! forwarded as-is, and protocol matching happens in the acquisition
//! session. It only enqueues; when the session drops its receiver the loop
//! ends on the next event.

use std::collections::HashMap;
use std::pin::Pin;

use btleplug::api::{Central, CentralEvent, CentralState, Peripheral as _, PeripheralProperties};
use btleplug::platform::{Adapter, PeripheralId};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt as _};

use bodyscale_app::payload::ManufacturerData;
use bodyscale_app::ports::{Advertisement, PlatformEvent};

pub(crate) type EventStream = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Build one [`Advertisement`] per manufacturer-data entry.
///
/// btleplug splits the company id off the blob; it is put back in front so
/// protocols decode the buffer exactly as broadcast. Entries are ordered by
/// company id so the output does not depend on map iteration order.
pub(crate) fn to_advertisements(
    address: &str,
    properties: Option<&PeripheralProperties>,
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> Vec<Advertisement> {
    let mut entries: Vec<_> = manufacturer_data.iter().collect();
    entries.sort_unstable_by_key(|(company_id, _)| **company_id);
    entries
        .into_iter()
        .map(|(company_id, data)| Advertisement {
            address: address.to_string(),
            name: properties.and_then(|props| props.local_name.clone()),
            rssi: properties.and_then(|props| props.rssi),
            manufacturer_data: ManufacturerData::from_company_entry(*company_id, data)
                .into_bytes(),
        })
        .collect()
}

/// Resolve the peripheral's address and properties.
///
/// Falls back to the platform id when the stack does not expose a MAC
/// address (the session then simply never recognises the device).
async fn describe(central: &Adapter, id: &PeripheralId) -> (String, Option<PeripheralProperties>) {
    let properties = match central.peripheral(id).await {
        Ok(peripheral) => peripheral.properties().await.ok().flatten(),
        Err(err) => {
            tracing::trace!(%err, peripheral = %id, "peripheral vanished before lookup");
            None
        }
    };
    let address = properties
        .as_ref()
        .map_or_else(|| id.to_string(), |props| props.address.to_string());
    (address, properties)
}

/// Forward events until the stream ends, the radio goes down, or the
/// session stops listening.
pub(crate) async fn forward_advertisements(
    central: Adapter,
    mut events: EventStream,
    tx: mpsc::Sender<PlatformEvent>,
) {
    while let Some(event) = events.next().await {
        match event {
            CentralEvent::ManufacturerDataAdvertisement {
                id,
                manufacturer_data,
            } => {
                let (address, properties) = describe(&central, &id).await;
                for advertisement in
                    to_advertisements(&address, properties.as_ref(), &manufacturer_data)
                {
                    tracing::trace!(
                        address = %advertisement.address,
                        rssi = ?advertisement.rssi,
                        "manufacturer data advertisement"
                    );
                    if tx.send(PlatformEvent::Advertisement(advertisement)).await.is_err() {
                        tracing::debug!("session stopped listening, ending BLE forwarding");
                        return;
                    }
                }
            }
            CentralEvent::StateUpdate(CentralState::PoweredOff) => {
                tracing::warn!("bluetooth adapter powered off during scan");
                let _ = tx
                    .send(PlatformEvent::Error("bluetooth adapter powered off".to_string()))
                    .await;
                return;
            }
            _ => {}
        }
    }
    let _ = tx
        .send(PlatformEvent::Error("bluetooth event stream ended".to_string()))
        .await;
}
