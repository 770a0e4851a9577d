//! Scanner: bridges a radio adapter to the registry ingestion path.
//!
//! Raw advertisements pass through the filtering pipeline here before they
//! become device candidates: a configured signal-strength threshold drops
//! weak observations, and surviving candidates are stamped and tagged with
//! the latest location fix when tracking is enabled.

use crate::domain::config::SdkConfiguration;
use crate::domain::models::BleDevice;
use crate::infrastructure::bluetooth::adapter::{
    AdapterEvent, AdapterEventSink, RadioAdapter, RawAdvertisement,
};
use crate::infrastructure::location::LocationProvider;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Events the scanner forwards to the SDK manager.
#[derive(Debug, Clone)]
pub enum ScannerEvent {
    /// An advertisement survived filtering and is ready for the registry.
    Candidate(BleDevice),
    /// Radio availability changed.
    PowerStateChanged(bool),
}

/// Sink the scanner delivers its events into.
pub type ScannerEventSink = Arc<dyn Fn(ScannerEvent) + Send + Sync>;

/// Owns the radio adapter and runs the filtering pipeline over its events.
pub struct BleScanner {
    adapter: Mutex<Box<dyn RadioAdapter>>,
    config: SdkConfiguration,
    location: Option<Arc<dyn LocationProvider>>,
}

impl BleScanner {
    pub fn new(
        adapter: Box<dyn RadioAdapter>,
        config: SdkConfiguration,
        location: Option<Arc<dyn LocationProvider>>,
    ) -> Self {
        Self {
            adapter: Mutex::new(adapter),
            config,
            location,
        }
    }

    /// Wires the adapter's events through the filtering pipeline into
    /// `sink`. Called once during manager construction.
    pub fn subscribe(&self, sink: ScannerEventSink) {
        let config = self.config.clone();
        let location = self.location.clone();

        let adapter_sink: AdapterEventSink = Arc::new(move |event| match event {
            AdapterEvent::Advertisement(raw) => {
                match build_candidate(raw, &config, location.as_deref()) {
                    Some(candidate) => sink(ScannerEvent::Candidate(candidate)),
                    None => trace!("Dropped advertisement below RSSI threshold"),
                }
            }
            AdapterEvent::PowerStateChanged(powered_on) => {
                sink(ScannerEvent::PowerStateChanged(powered_on));
            }
        });

        self.adapter.lock().unwrap().subscribe(adapter_sink);
    }

    pub fn start(&self) {
        self.adapter.lock().unwrap().start();
    }

    pub fn stop(&self) {
        self.adapter.lock().unwrap().stop();
    }
}

/// Builds a device candidate from a raw advertisement, or drops it.
///
/// Candidates with a signal strength strictly below the configured
/// threshold are discarded with no side effect; an equal reading is kept.
/// The location fix is read synchronously and best-effort: when no fix is
/// available at this instant, the field stays empty for this observation
/// only.
fn build_candidate(
    raw: RawAdvertisement,
    config: &SdkConfiguration,
    location: Option<&dyn LocationProvider>,
) -> Option<BleDevice> {
    if let Some(threshold) = config.rssi_threshold {
        if raw.rssi < threshold {
            return None;
        }
    }

    let fix = if config.enable_location_tracking {
        location.and_then(LocationProvider::latest_location)
    } else {
        None
    };

    Some(BleDevice {
        id: raw.id,
        name: raw.local_name,
        rssi: raw.rssi,
        discovered_at: Utc::now(),
        location: fix,
        manufacturer_data: raw.manufacturer_data,
        service_uuids: raw.service_uuids,
        service_data: raw.service_data,
        tx_power_level: raw.tx_power_level,
        is_connectable: raw.is_connectable,
    })
}
