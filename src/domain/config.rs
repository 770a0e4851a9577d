//! SDK configuration, supplied once at construction and immutable after.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for the BLE SDK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfiguration {
    /// Scan only for advertisements carrying one of these service
    /// identifiers. `None` surfaces all devices. Applied by the adapter at
    /// subscription setup, not re-checked per event.
    #[serde(default)]
    pub service_filter: Option<Vec<Uuid>>,

    /// Whether discovered devices are tagged with the current location.
    #[serde(default = "default_true")]
    pub enable_location_tracking: bool,

    /// Whether the adapter may keep scanning while the host application is
    /// backgrounded.
    #[serde(default = "default_false")]
    pub allow_background_scanning: bool,

    /// Discovery candidates with a signal strength strictly below this
    /// threshold are dropped before reaching the registry. Equal is kept.
    /// `None` disables the filter.
    #[serde(default)]
    pub rssi_threshold: Option<i16>,
}

impl Default for SdkConfiguration {
    fn default() -> Self {
        Self {
            service_filter: None,
            enable_location_tracking: default_true(),
            allow_background_scanning: default_false(),
            rssi_threshold: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
