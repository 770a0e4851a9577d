//! Boundary contract between the SDK core and a platform radio stack.

use crate::domain::models::DeviceId;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One advertisement as reported by the platform, before filtering.
///
/// Adapters report every advertisement they receive, repeats from the same
/// device included. Deduplication is the registry's job.
#[derive(Debug, Clone)]
pub struct RawAdvertisement {
    pub id: DeviceId,
    pub local_name: Option<String>,
    pub rssi: i16,
    pub manufacturer_data: Option<Vec<u8>>,
    pub service_uuids: Option<Vec<Uuid>>,
    pub service_data: Option<HashMap<Uuid, Vec<u8>>>,
    pub tx_power_level: Option<i16>,
    pub is_connectable: Option<bool>,
}

/// Events an adapter delivers to its subscriber.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// An advertisement was received.
    Advertisement(RawAdvertisement),
    /// The radio's availability changed. `false` while scanning is an
    /// asynchronous fault and triggers a forced stop upstream.
    PowerStateChanged(bool),
}

/// Sink an adapter delivers its events into.
pub type AdapterEventSink = Arc<dyn Fn(AdapterEvent) + Send + Sync>;

/// A platform device-discovery backend.
///
/// The service filter from the configuration is handed to the adapter at
/// construction and applied when the platform subscription is set up, never
/// re-checked per event.
///
/// Adapters deliver events from their own worker context. They must not
/// invoke the sink re-entrantly from inside `start` or `stop`; the caller
/// may hold its state lock across those calls.
pub trait RadioAdapter: Send {
    /// Installs the event sink. Called once, before the first `start`.
    fn subscribe(&mut self, sink: AdapterEventSink);

    /// Begins the platform scan. Requires the radio to be powered on; if it
    /// is not, the adapter logs and returns without effect. That is a
    /// precondition check, not a fault, and raises no error event.
    fn start(&mut self);

    /// Ends the platform scan. Idempotent; always safe to call.
    fn stop(&mut self);
}
