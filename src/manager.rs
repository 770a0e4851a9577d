//! SDK manager: scanning state machine, registry ownership and the public
//! command surface.
//!
//! All commands are synchronous and infallible from the caller's
//! perspective: they update local state, fire callbacks and return.
//! Failures reach the caller only through the error callback or the
//! absence of an expected state-change callback. A scan runs until
//! [`BleSdkManager::stop_scanning`] is called or the radio reports power
//! loss; there is no timeout and no cancellation token.

use crate::callbacks::CallbackRegistry;
use crate::domain::config::SdkConfiguration;
use crate::domain::models::{BleDevice, DeviceId, ScanningState};
use crate::domain::registry::{DeviceRegistry, UpsertOutcome};
use crate::error::BleSdkError;
use crate::infrastructure::bluetooth::adapter::RadioAdapter;
use crate::infrastructure::bluetooth::scanner::{BleScanner, ScannerEvent};
use crate::infrastructure::location::LocationProvider;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// Main entry point for device discovery.
///
/// Cheap to clone; clones share the same registry, state and callbacks.
#[derive(Clone)]
pub struct BleSdkManager {
    core: Arc<ManagerCore>,
}

struct ManagerCore {
    scanner: BleScanner,
    location: Option<Arc<dyn LocationProvider>>,
    registry: DeviceRegistry,
    state: Mutex<ScanningState>,
    callbacks: CallbackRegistry,
}

impl BleSdkManager {
    /// Builds a manager around the platform radio backend.
    ///
    /// A location provider is wired in only when the configuration enables
    /// location tracking.
    #[cfg(windows)]
    pub fn new(configuration: SdkConfiguration) -> anyhow::Result<Self> {
        use crate::infrastructure::bluetooth::watcher::WinRtRadioAdapter;
        use crate::infrastructure::location::WindowsLocationProvider;

        let adapter = Box::new(WinRtRadioAdapter::new(&configuration)?);
        let location: Option<Arc<dyn LocationProvider>> = if configuration.enable_location_tracking
        {
            Some(Arc::new(WindowsLocationProvider::new()?))
        } else {
            None
        };

        Ok(Self::with_adapter(configuration, adapter, location))
    }

    /// Builds a manager around any radio backend.
    ///
    /// This is the portable constructor: integrations on other platforms
    /// and tests supply their own [`RadioAdapter`]. The location provider
    /// is ignored when the configuration disables location tracking.
    pub fn with_adapter(
        configuration: SdkConfiguration,
        adapter: Box<dyn RadioAdapter>,
        location: Option<Arc<dyn LocationProvider>>,
    ) -> Self {
        let location = if configuration.enable_location_tracking {
            location
        } else {
            None
        };

        let core = Arc::new(ManagerCore {
            scanner: BleScanner::new(adapter, configuration, location.clone()),
            location,
            registry: DeviceRegistry::new(),
            state: Mutex::new(ScanningState::Stopped),
            callbacks: CallbackRegistry::default(),
        });

        let weak: Weak<ManagerCore> = Arc::downgrade(&core);
        core.scanner.subscribe(Arc::new(move |event| {
            if let Some(core) = weak.upgrade() {
                match event {
                    ScannerEvent::Candidate(device) => core.ingest(device),
                    ScannerEvent::PowerStateChanged(powered_on) => {
                        core.power_state_changed(powered_on);
                    }
                }
            }
        }));

        info!("BLE SDK initialized");
        Self { core }
    }

    /// Starts scanning for BLE devices.
    ///
    /// No-op (logged) if already scanning. Otherwise starts the adapter and
    /// location updates, transitions to [`ScanningState::Scanning`] and
    /// fires the state-change callback. The transition happens even when
    /// the adapter silently refused to start because the radio is not
    /// ready; that refusal is a precondition check, not a fault.
    pub fn start_scanning(&self) {
        let mut state = self.core.state.lock().unwrap();
        if *state == ScanningState::Scanning {
            info!("Already scanning");
            return;
        }

        self.core.scanner.start();
        if let Some(location) = &self.core.location {
            location.start();
        }
        *state = ScanningState::Scanning;
        drop(state);

        self.core
            .callbacks
            .notify_scanning_state_changed(ScanningState::Scanning);
        info!("Started scanning");
    }

    /// Stops scanning for BLE devices.
    ///
    /// No-op (logged) if not scanning. Previously discovered devices stay
    /// in the registry; use [`BleSdkManager::clear_devices`] to drop them.
    pub fn stop_scanning(&self) {
        let mut state = self.core.state.lock().unwrap();
        if *state != ScanningState::Scanning {
            info!("Not currently scanning");
            return;
        }

        self.core.scanner.stop();
        if let Some(location) = &self.core.location {
            location.stop();
        }
        *state = ScanningState::Stopped;
        drop(state);

        self.core
            .callbacks
            .notify_scanning_state_changed(ScanningState::Stopped);
        info!("Stopped scanning");
    }

    /// Removes all discovered devices. Fires no per-device events and does
    /// not touch the scanning state.
    pub fn clear_devices(&self) {
        self.core.registry.clear();
        info!("Cleared all devices");
    }

    /// The device with the given identifier, if it has been observed.
    pub fn device(&self, id: DeviceId) -> Option<BleDevice> {
        self.core.registry.get(id)
    }

    /// All discovered devices, most recently observed first.
    pub fn devices(&self) -> Vec<BleDevice> {
        self.core.registry.snapshot()
    }

    /// The current scanning state.
    pub fn scanning_state(&self) -> ScanningState {
        *self.core.state.lock().unwrap()
    }

    /// Registers the callback invoked when a new device is discovered,
    /// replacing any previous one.
    pub fn on_device_discovered<F>(&self, callback: F)
    where
        F: Fn(&BleDevice) + Send + Sync + 'static,
    {
        self.core.callbacks.set_device_discovered(callback);
    }

    /// Registers the callback invoked when a known device is observed
    /// again, replacing any previous one.
    pub fn on_device_updated<F>(&self, callback: F)
    where
        F: Fn(&BleDevice) + Send + Sync + 'static,
    {
        self.core.callbacks.set_device_updated(callback);
    }

    /// Registers the callback invoked on scanning state transitions,
    /// replacing any previous one.
    pub fn on_scanning_state_changed<F>(&self, callback: F)
    where
        F: Fn(ScanningState) + Send + Sync + 'static,
    {
        self.core.callbacks.set_scanning_state_changed(callback);
    }

    /// Registers the callback invoked on asynchronous faults, replacing
    /// any previous one.
    pub fn on_error_encountered<F>(&self, callback: F)
    where
        F: Fn(BleSdkError) + Send + Sync + 'static,
    {
        self.core.callbacks.set_error_encountered(callback);
    }
}

impl ManagerCore {
    /// Feeds a filtered candidate into the registry and fires the matching
    /// callback. The registry lock is released before the callback runs.
    fn ingest(&self, device: BleDevice) {
        let label = device.name.clone().unwrap_or_else(|| "Unknown".to_string());
        match self.registry.upsert(device.clone()) {
            UpsertOutcome::Discovered => {
                debug!("Discovered new device: {label}");
                self.callbacks.notify_device_discovered(&device);
            }
            UpsertOutcome::Updated => {
                debug!("Updated device: {label}");
                self.callbacks.notify_device_updated(&device);
            }
        }
    }

    /// Handles a radio availability change from the adapter.
    ///
    /// Power loss while scanning forces a stop: adapter and location
    /// updates end, the state machine transitions to `Stopped` and the
    /// subscriber hears `ScanningStateChanged(Stopped)` followed by
    /// `ErrorEncountered(BluetoothPoweredOff)`. The state lock serializes
    /// this against a concurrent manual stop; whichever runs second finds
    /// the state already `Stopped` and becomes a no-op.
    fn power_state_changed(&self, powered_on: bool) {
        if powered_on {
            info!("Bluetooth radio is ready");
            return;
        }

        let mut state = self.state.lock().unwrap();
        if *state != ScanningState::Scanning {
            debug!("Radio powered off while not scanning");
            return;
        }

        warn!("Bluetooth radio powered off, forcing scan stop");
        self.scanner.stop();
        if let Some(location) = &self.location {
            location.stop();
        }
        *state = ScanningState::Stopped;
        drop(state);

        self.callbacks
            .notify_scanning_state_changed(ScanningState::Stopped);
        self.callbacks.notify_error(BleSdkError::BluetoothPoweredOff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::adapter::{
        AdapterEvent, AdapterEventSink, RawAdvertisement,
    };
    use crate::domain::models::LocationData;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockAdapterHandle {
        sink: Mutex<Option<AdapterEventSink>>,
        powered_on: AtomicBool,
        radio_active: AtomicBool,
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
    }

    impl MockAdapterHandle {
        fn powered(on: bool) -> Arc<Self> {
            let handle = Arc::new(Self::default());
            handle.powered_on.store(on, Ordering::SeqCst);
            handle
        }

        fn emit(&self, event: AdapterEvent) {
            let sink = self.sink.lock().unwrap().clone();
            if let Some(sink) = sink {
                sink(event);
            }
        }

        fn advertise(&self, id: u64, rssi: i16) {
            self.emit(AdapterEvent::Advertisement(RawAdvertisement {
                id: DeviceId::new(id),
                local_name: Some(format!("device-{id}")),
                rssi,
                manufacturer_data: None,
                service_uuids: None,
                service_data: None,
                tx_power_level: None,
                is_connectable: None,
            }));
        }

        fn power_off(&self) {
            self.emit(AdapterEvent::PowerStateChanged(false));
        }
    }

    struct MockAdapter {
        handle: Arc<MockAdapterHandle>,
    }

    impl RadioAdapter for MockAdapter {
        fn subscribe(&mut self, sink: AdapterEventSink) {
            *self.handle.sink.lock().unwrap() = Some(sink);
        }

        fn start(&mut self) {
            self.handle.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.handle.powered_on.load(Ordering::SeqCst) {
                self.handle.radio_active.store(true, Ordering::SeqCst);
            }
        }

        fn stop(&mut self) {
            self.handle.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.handle.radio_active.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingLocationProvider {
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
        fix: Mutex<Option<LocationData>>,
    }

    impl LocationProvider for RecordingLocationProvider {
        fn start(&self) {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn latest_location(&self) -> Option<LocationData> {
            self.fix.lock().unwrap().clone()
        }
    }

    struct Harness {
        manager: BleSdkManager,
        adapter: Arc<MockAdapterHandle>,
        location: Arc<RecordingLocationProvider>,
        state_events: Arc<Mutex<Vec<ScanningState>>>,
        discovered: Arc<Mutex<Vec<BleDevice>>>,
        updated: Arc<Mutex<Vec<BleDevice>>>,
        errors: Arc<Mutex<Vec<BleSdkError>>>,
    }

    fn harness(configuration: SdkConfiguration) -> Harness {
        let adapter = MockAdapterHandle::powered(true);
        let location = Arc::new(RecordingLocationProvider::default());
        let manager = BleSdkManager::with_adapter(
            configuration,
            Box::new(MockAdapter {
                handle: adapter.clone(),
            }),
            Some(location.clone() as Arc<dyn LocationProvider>),
        );

        let state_events = Arc::new(Mutex::new(Vec::new()));
        let sink = state_events.clone();
        manager.on_scanning_state_changed(move |state| sink.lock().unwrap().push(state));

        let discovered = Arc::new(Mutex::new(Vec::new()));
        let sink = discovered.clone();
        manager.on_device_discovered(move |device| sink.lock().unwrap().push(device.clone()));

        let updated = Arc::new(Mutex::new(Vec::new()));
        let sink = updated.clone();
        manager.on_device_updated(move |device| sink.lock().unwrap().push(device.clone()));

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        manager.on_error_encountered(move |error| sink.lock().unwrap().push(error));

        Harness {
            manager,
            adapter,
            location,
            state_events,
            discovered,
            updated,
            errors,
        }
    }

    #[test]
    fn initial_state_is_stopped_and_empty() {
        let h = harness(SdkConfiguration::default());
        assert_eq!(h.manager.scanning_state(), ScanningState::Stopped);
        assert!(h.manager.devices().is_empty());
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.manager.start_scanning();

        assert_eq!(h.manager.scanning_state(), ScanningState::Scanning);
        assert_eq!(h.adapter.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*h.state_events.lock().unwrap(), vec![ScanningState::Scanning]);
    }

    #[test]
    fn unpowered_radio_refusal_still_transitions() {
        let h = harness(SdkConfiguration::default());
        h.adapter.powered_on.store(false, Ordering::SeqCst);
        h.manager.start_scanning();

        // The adapter refused silently; the state machine transitions
        // anyway and no error is reported.
        assert_eq!(h.manager.scanning_state(), ScanningState::Scanning);
        assert!(!h.adapter.radio_active.load(Ordering::SeqCst));
        assert!(h.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let h = harness(SdkConfiguration::default());
        h.manager.stop_scanning();

        assert_eq!(h.manager.scanning_state(), ScanningState::Stopped);
        assert_eq!(h.adapter.stop_calls.load(Ordering::SeqCst), 0);
        assert!(h.state_events.lock().unwrap().is_empty());
    }

    #[test]
    fn start_stop_cycle_drives_adapter_and_location() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.manager.stop_scanning();

        assert_eq!(h.adapter.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.adapter.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.location.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.location.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *h.state_events.lock().unwrap(),
            vec![ScanningState::Scanning, ScanningState::Stopped]
        );
    }

    #[test]
    fn location_provider_unused_when_tracking_disabled() {
        let h = harness(SdkConfiguration {
            enable_location_tracking: false,
            ..Default::default()
        });
        h.manager.start_scanning();
        h.manager.stop_scanning();

        assert_eq!(h.location.start_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.location.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn first_observation_fires_discovered_once() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.advertise(0xA, -60);

        assert_eq!(h.discovered.lock().unwrap().len(), 1);
        assert!(h.updated.lock().unwrap().is_empty());
        assert_eq!(h.manager.device(DeviceId::new(0xA)).unwrap().rssi, -60);
    }

    #[test]
    fn second_observation_fires_updated_and_replaces() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.advertise(0xA, -60);
        let first_seen = h.manager.device(DeviceId::new(0xA)).unwrap().discovered_at;

        h.adapter.advertise(0xA, -65);

        assert_eq!(h.discovered.lock().unwrap().len(), 1);
        assert_eq!(h.updated.lock().unwrap().len(), 1);
        let stored = h.manager.device(DeviceId::new(0xA)).unwrap();
        assert_eq!(stored.rssi, -65);
        assert!(stored.discovered_at >= first_seen);
        assert_eq!(h.manager.devices().len(), 1);
    }

    #[test]
    fn below_threshold_leaves_registry_untouched() {
        let h = harness(SdkConfiguration {
            rssi_threshold: Some(-70),
            ..Default::default()
        });
        h.manager.start_scanning();
        h.adapter.advertise(0xA, -80);

        assert!(h.manager.devices().is_empty());
        assert!(h.discovered.lock().unwrap().is_empty());
        assert!(h.updated.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_keeps_the_registry() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.advertise(0xA, -60);
        h.adapter.advertise(0xB, -62);
        h.manager.stop_scanning();

        assert_eq!(h.manager.devices().len(), 2);
    }

    #[test]
    fn clear_devices_keeps_scanning_state() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.advertise(0xA, -60);
        h.manager.clear_devices();

        assert!(h.manager.devices().is_empty());
        assert_eq!(h.manager.scanning_state(), ScanningState::Scanning);
    }

    #[test]
    fn power_loss_while_scanning_forces_stop() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.power_off();

        assert_eq!(h.manager.scanning_state(), ScanningState::Stopped);
        assert_eq!(
            *h.errors.lock().unwrap(),
            vec![BleSdkError::BluetoothPoweredOff]
        );
        assert_eq!(h.adapter.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.location.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *h.state_events.lock().unwrap(),
            vec![ScanningState::Scanning, ScanningState::Stopped]
        );
    }

    #[test]
    fn repeated_power_loss_reports_once() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.power_off();
        h.adapter.power_off();

        assert_eq!(h.errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn power_loss_while_stopped_is_silent() {
        let h = harness(SdkConfiguration::default());
        h.adapter.power_off();

        assert!(h.errors.lock().unwrap().is_empty());
        assert!(h.state_events.lock().unwrap().is_empty());
    }

    #[test]
    fn manual_stop_after_forced_stop_is_a_no_op() {
        let h = harness(SdkConfiguration::default());
        h.manager.start_scanning();
        h.adapter.power_off();
        h.manager.stop_scanning();

        assert_eq!(h.errors.lock().unwrap().len(), 1);
        assert_eq!(
            *h.state_events.lock().unwrap(),
            vec![ScanningState::Scanning, ScanningState::Stopped]
        );
    }

    #[test]
    fn discovery_callback_can_query_the_manager() {
        let h = harness(SdkConfiguration::default());
        let seen_inside = Arc::new(Mutex::new(None));

        let manager = h.manager.clone();
        let sink = seen_inside.clone();
        h.manager.on_device_discovered(move |device| {
            *sink.lock().unwrap() = manager.device(device.id);
        });

        h.manager.start_scanning();
        h.adapter.advertise(0xA, -60);

        let seen = seen_inside.lock().unwrap().clone().unwrap();
        assert_eq!(seen.rssi, -60);
    }

    #[test]
    fn candidate_tagged_with_latest_fix() {
        let h = harness(SdkConfiguration::default());
        *h.location.fix.lock().unwrap() = Some(LocationData {
            latitude: 48.85,
            longitude: 2.35,
            altitude: None,
            horizontal_accuracy: 10.0,
            vertical_accuracy: None,
            timestamp: Utc::now(),
        });

        h.manager.start_scanning();
        h.adapter.advertise(0xA, -60);

        let stored = h.manager.device(DeviceId::new(0xA)).unwrap();
        assert_eq!(stored.location.unwrap().latitude, 48.85);
    }
}
