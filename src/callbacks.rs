//! Event dispatch contract exposed to subscribers.
//!
//! One callback slot per event kind; registering a new callback replaces
//! the previous one for that kind. There is no multi-subscriber fan-out.
//! Events triggered by a single raw advertisement are delivered
//! synchronously on the adapter's delivery context, in pipeline order,
//! before the next raw event from that context is processed. Subscribers
//! that re-dispatch onto their own execution context forfeit that ordering.

use crate::domain::models::{BleDevice, ScanningState};
use crate::error::BleSdkError;
use std::sync::{Arc, Mutex};

/// Invoked when a device identifier is seen for the first time in this
/// session.
pub type DeviceDiscoveredCallback = Arc<dyn Fn(&BleDevice) + Send + Sync>;

/// Invoked when a known device identifier is observed again; the record
/// passed is the full replacement, not a delta.
pub type DeviceUpdatedCallback = Arc<dyn Fn(&BleDevice) + Send + Sync>;

/// Invoked on every scanning state transition.
pub type ScanningStateChangedCallback = Arc<dyn Fn(ScanningState) + Send + Sync>;

/// Invoked when the SDK encounters an asynchronous fault.
pub type ErrorEncounteredCallback = Arc<dyn Fn(BleSdkError) + Send + Sync>;

/// Single-slot callback registry.
///
/// Slots are cloned out of their lock before invocation, so a callback may
/// re-enter the SDK (query devices, replace a callback) without deadlock.
#[derive(Default)]
pub struct CallbackRegistry {
    device_discovered: Mutex<Option<DeviceDiscoveredCallback>>,
    device_updated: Mutex<Option<DeviceUpdatedCallback>>,
    scanning_state_changed: Mutex<Option<ScanningStateChangedCallback>>,
    error_encountered: Mutex<Option<ErrorEncounteredCallback>>,
}

impl CallbackRegistry {
    pub fn set_device_discovered<F>(&self, callback: F)
    where
        F: Fn(&BleDevice) + Send + Sync + 'static,
    {
        *self.device_discovered.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn set_device_updated<F>(&self, callback: F)
    where
        F: Fn(&BleDevice) + Send + Sync + 'static,
    {
        *self.device_updated.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn set_scanning_state_changed<F>(&self, callback: F)
    where
        F: Fn(ScanningState) + Send + Sync + 'static,
    {
        *self.scanning_state_changed.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn set_error_encountered<F>(&self, callback: F)
    where
        F: Fn(BleSdkError) + Send + Sync + 'static,
    {
        *self.error_encountered.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn notify_device_discovered(&self, device: &BleDevice) {
        let callback = self.device_discovered.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(device);
        }
    }

    pub fn notify_device_updated(&self, device: &BleDevice) {
        let callback = self.device_updated.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(device);
        }
    }

    pub fn notify_scanning_state_changed(&self, state: ScanningState) {
        let callback = self.scanning_state_changed.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(state);
        }
    }

    pub fn notify_error(&self, error: BleSdkError) {
        let callback = self.error_encountered.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }
}
