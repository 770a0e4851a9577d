//! # BLE Device Discovery SDK
//!
//! Discovers nearby Bluetooth Low Energy devices, deduplicates them into an
//! in-memory registry, optionally tags each observation with the caller's
//! current location, and notifies one subscriber per event kind of
//! discovery, update, state and error events.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      BleSdkManager                        │
//! │  (state machine, registry, callbacks - the public API)    │
//! └───────────┬──────────────────────────────┬───────────────┘
//!             │                              │
//!             ▼                              ▼
//!     ┌──────────────┐               ┌────────────────┐
//!     │  BleScanner  │               │ DeviceRegistry │
//!     │  (filtering  │               │  (dedup map,   │
//!     │   pipeline)  │               │   snapshots)   │
//!     └──────┬───────┘               └────────────────┘
//!            │
//!     ┌──────┴───────┐      ┌──────────────────┐
//!     │ RadioAdapter │      │ LocationProvider │
//!     │   (trait)    │      │     (trait)      │
//!     └──────────────┘      └──────────────────┘
//! ```
//!
//! Raw advertisements flow from the radio adapter through the filtering
//! pipeline into the registry; the registry's insert-or-replace decision
//! drives the discovered/updated callbacks. The manager supervises the
//! adapter and location provider lifecycle and is the only component that
//! issues start/stop commands downward.
//!
//! ## Quick start
//!
//! On Windows, [`create_manager`] wires the platform backends. On other
//! platforms, supply a [`RadioAdapter`] implementation:
//!
//! ```no_run
//! use blesdk::{AdapterEventSink, BleSdkManager, RadioAdapter, SdkConfiguration};
//!
//! struct NoopAdapter;
//!
//! impl RadioAdapter for NoopAdapter {
//!     fn subscribe(&mut self, _sink: AdapterEventSink) {}
//!     fn start(&mut self) {}
//!     fn stop(&mut self) {}
//! }
//!
//! let config = SdkConfiguration {
//!     rssi_threshold: Some(-70),
//!     ..Default::default()
//! };
//! let manager = BleSdkManager::with_adapter(config, Box::new(NoopAdapter), None);
//! manager.on_device_discovered(|device| println!("discovered {}", device.id));
//! manager.start_scanning();
//! ```

pub mod callbacks;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod manager;

pub use callbacks::{
    DeviceDiscoveredCallback, DeviceUpdatedCallback, ErrorEncounteredCallback,
    ScanningStateChangedCallback,
};
pub use domain::config::SdkConfiguration;
pub use domain::models::{BleDevice, DeviceId, LocationData, ScanningState};
pub use domain::registry::UpsertOutcome;
pub use error::BleSdkError;
pub use infrastructure::bluetooth::adapter::{
    AdapterEvent, AdapterEventSink, RadioAdapter, RawAdvertisement,
};
pub use infrastructure::location::{LocationProvider, ManualLocationProvider};
#[cfg(windows)]
pub use infrastructure::location::WindowsLocationProvider;
pub use manager::BleSdkManager;

/// The current version of the SDK.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a manager wired to the platform radio and location backends.
#[cfg(windows)]
pub fn create_manager(configuration: SdkConfiguration) -> anyhow::Result<BleSdkManager> {
    BleSdkManager::new(configuration)
}
