//! WinRT advertisement-watcher backend for the radio adapter contract.
//!
//! Wraps `BluetoothLEAdvertisementWatcher` in active scanning mode and
//! translates its events into [`AdapterEvent`]s. Radio availability is
//! tracked through the default Bluetooth adapter's `Radio` object; a
//! watcher stop caused by `RadioNotAvailable` is reported the same way.

use crate::domain::config::SdkConfiguration;
use crate::domain::models::DeviceId;
use crate::infrastructure::bluetooth::adapter::{
    AdapterEvent, AdapterEventSink, RadioAdapter, RawAdvertisement,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisement, BluetoothLEAdvertisementReceivedEventArgs,
    BluetoothLEAdvertisementWatcher, BluetoothLEAdvertisementWatcherStoppedEventArgs,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::{BluetoothAdapter, BluetoothError};
use windows::Devices::Radios::{Radio, RadioState};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, IBuffer};

const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

// Advertisement data-section types carrying service data.
const SECTION_SERVICE_DATA_16: u8 = 0x16;
const SECTION_SERVICE_DATA_32: u8 = 0x20;
const SECTION_SERVICE_DATA_128: u8 = 0x21;

struct WatcherShared {
    sink: Mutex<Option<AdapterEventSink>>,
    last_powered: Mutex<Option<bool>>,
}

impl WatcherShared {
    fn emit(&self, event: AdapterEvent) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    /// Forwards a power-state reading, collapsing repeats.
    fn report_power_state(&self, powered_on: bool) {
        let mut last = self.last_powered.lock().unwrap();
        if *last == Some(powered_on) {
            return;
        }
        *last = Some(powered_on);
        drop(last);
        self.emit(AdapterEvent::PowerStateChanged(powered_on));
    }
}

/// Radio adapter backed by the Windows advertisement watcher.
pub struct WinRtRadioAdapter {
    watcher: BluetoothLEAdvertisementWatcher,
    radio: Option<Radio>,
    shared: Arc<WatcherShared>,
}

impl WinRtRadioAdapter {
    pub fn new(config: &SdkConfiguration) -> Result<Self> {
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        if config.allow_background_scanning {
            watcher.SetAllowExtendedAdvertisements(true)?;
        }

        // The service filter goes into the watcher subscription itself and
        // is not re-checked per event.
        if let Some(services) = &config.service_filter {
            let filter_uuids = watcher.AdvertisementFilter()?.Advertisement()?.ServiceUuids()?;
            for service in services {
                filter_uuids.Append(GUID::from_u128(service.as_u128()))?;
            }
        }

        let shared = Arc::new(WatcherShared {
            sink: Mutex::new(None),
            last_powered: Mutex::new(None),
        });

        let received_shared = shared.clone();
        let received_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    match parse_advertisement(args) {
                        Ok(raw) => received_shared.emit(AdapterEvent::Advertisement(raw)),
                        Err(e) => debug!("Failed to parse advertisement: {e}"),
                    }
                }
                Ok(())
            },
        );
        watcher.Received(&received_handler)?;

        let stopped_shared = shared.clone();
        let stopped_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementWatcherStoppedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    if args.Error()? == BluetoothError::RadioNotAvailable {
                        stopped_shared.report_power_state(false);
                    }
                }
                Ok(())
            },
        );
        watcher.Stopped(&stopped_handler)?;

        let radio = default_radio();
        if let Some(radio) = &radio {
            let state_shared = shared.clone();
            let state_handler = TypedEventHandler::new(
                move |radio: windows::core::Ref<Radio>,
                      _: windows::core::Ref<windows::core::IInspectable>| {
                    if let Some(radio) = radio.as_ref() {
                        let powered_on = radio.State()? == RadioState::On;
                        if powered_on {
                            info!("Bluetooth radio is ready");
                        } else {
                            error!("Bluetooth radio is not available");
                        }
                        state_shared.report_power_state(powered_on);
                    }
                    Ok(())
                },
            );
            radio.StateChanged(&state_handler)?;
        }

        Ok(Self {
            watcher,
            radio,
            shared,
        })
    }

    fn is_powered_on(&self) -> bool {
        self.radio
            .as_ref()
            .and_then(|radio| radio.State().ok())
            .map(|state| state == RadioState::On)
            .unwrap_or(false)
    }
}

impl RadioAdapter for WinRtRadioAdapter {
    fn subscribe(&mut self, sink: AdapterEventSink) {
        *self.shared.sink.lock().unwrap() = Some(sink);
    }

    fn start(&mut self) {
        if !self.is_powered_on() {
            error!("Cannot start scanning - Bluetooth not powered on");
            return;
        }

        match self.watcher.Start() {
            Ok(()) => info!("Started BLE advertisement watcher"),
            Err(e) => error!("Failed to start advertisement watcher: {e}"),
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.watcher.Stop() {
            debug!("Advertisement watcher stop: {e}");
        } else {
            info!("Stopped BLE advertisement watcher");
        }
    }
}

impl Drop for WinRtRadioAdapter {
    fn drop(&mut self) {
        let _ = self.watcher.Stop();
    }
}

/// Resolves the radio object of the default Bluetooth adapter.
fn default_radio() -> Option<Radio> {
    let radio = (|| -> Result<Radio> {
        let adapter = BluetoothAdapter::GetDefaultAsync()?.get()?;
        Ok(adapter.GetRadioAsync()?.get()?)
    })();

    match radio {
        Ok(radio) => Some(radio),
        Err(e) => {
            error!("No default Bluetooth adapter available: {e}");
            None
        }
    }
}

fn parse_advertisement(
    args: &BluetoothLEAdvertisementReceivedEventArgs,
) -> windows::core::Result<RawAdvertisement> {
    let advertisement = args.Advertisement()?;

    let local_name = {
        let name = advertisement.LocalName()?.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    };

    let mut service_uuids = Vec::new();
    let advertised = advertisement.ServiceUuids()?;
    for i in 0..advertised.Size()? {
        service_uuids.push(Uuid::from_u128(advertised.GetAt(i)?.to_u128()));
    }

    Ok(RawAdvertisement {
        id: DeviceId::new(args.BluetoothAddress()?),
        local_name,
        rssi: args.RawSignalStrengthInDBm()?,
        manufacturer_data: parse_manufacturer_data(&advertisement)?,
        service_uuids: if service_uuids.is_empty() {
            None
        } else {
            Some(service_uuids)
        },
        service_data: parse_service_data(&advertisement)?,
        tx_power_level: args
            .TransmitPowerLevelInDBm()
            .ok()
            .and_then(|power| power.Value().ok()),
        is_connectable: args.IsConnectable().ok(),
    })
}

/// Flattens manufacturer sections into the company-id-prefixed layout the
/// rest of the SDK stores: two bytes of company identifier, little-endian,
/// followed by the payload.
fn parse_manufacturer_data(
    advertisement: &BluetoothLEAdvertisement,
) -> windows::core::Result<Option<Vec<u8>>> {
    let sections = advertisement.ManufacturerData()?;
    let mut data = Vec::new();
    for i in 0..sections.Size()? {
        let section = sections.GetAt(i)?;
        data.extend_from_slice(&section.CompanyId()?.to_le_bytes());
        data.extend_from_slice(&buffer_to_bytes(&section.Data()?)?);
    }
    Ok(if data.is_empty() { None } else { Some(data) })
}

/// Extracts per-service payloads from the advertisement's raw data
/// sections. Service data comes in three section types keyed by 16-, 32-
/// or 128-bit identifiers, all little-endian on the wire.
fn parse_service_data(
    advertisement: &BluetoothLEAdvertisement,
) -> windows::core::Result<Option<HashMap<Uuid, Vec<u8>>>> {
    let sections = advertisement.DataSections()?;
    let mut data = HashMap::new();

    for i in 0..sections.Size()? {
        let section = sections.GetAt(i)?;
        let bytes = buffer_to_bytes(&section.Data()?)?;

        let entry = match section.DataType()? {
            SECTION_SERVICE_DATA_16 if bytes.len() >= 2 => {
                let short = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
                Some((uuid_from_short(short), bytes[2..].to_vec()))
            }
            SECTION_SERVICE_DATA_32 if bytes.len() >= 4 => {
                let short = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Some((uuid_from_short(short), bytes[4..].to_vec()))
            }
            SECTION_SERVICE_DATA_128 if bytes.len() >= 16 => {
                let mut uuid_bytes = [0u8; 16];
                uuid_bytes.copy_from_slice(&bytes[..16]);
                Some((Uuid::from_bytes_le(uuid_bytes), bytes[16..].to_vec()))
            }
            _ => None,
        };

        if let Some((uuid, payload)) = entry {
            data.insert(uuid, payload);
        }
    }

    Ok(if data.is_empty() { None } else { Some(data) })
}

fn uuid_from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

fn buffer_to_bytes(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let length = reader.UnconsumedBufferLength()? as usize;
    let mut bytes = vec![0u8; length];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}
