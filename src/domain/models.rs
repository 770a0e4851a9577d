//! Core data model: discovered devices, their identifiers, location fixes
//! and the scanning lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Stable identifier for a device within one scanning session.
///
/// Wraps the 64-bit radio address reported by the platform. Real hardware
/// may rotate this address between sessions for privacy, so identity is
/// only meaningful for the lifetime of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeviceId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DeviceId {
    /// Renders the low 48 bits as a colon-separated MAC address.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]
        )
    }
}

/// GPS fix captured when a device observation was ingested.
///
/// Present on a device record only when location tracking is enabled and the
/// location provider had a fix at that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Scanning lifecycle of the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanningState {
    /// Scanning is not active. Initial state.
    Stopped,
    /// Actively scanning for BLE devices.
    Scanning,
    /// Declared for forward compatibility. No transition currently enters
    /// this state.
    Paused,
}

/// A discovered BLE device as held by the registry.
///
/// Every field except [`BleDevice::id`] is wholesale replaced each time a
/// new advertisement from the same device passes the filter. There is no
/// field-level merging of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BleDevice {
    /// Registry key. Never changes for the lifetime of the record.
    pub id: DeviceId,
    /// Advertised local name, if the device broadcast one.
    pub name: Option<String>,
    /// Signal strength of the most recent observation, in dBm.
    pub rssi: i16,
    /// Timestamp of the most recent observation. The name is historical:
    /// the update path refreshes it on every advertisement, so it behaves
    /// as a last-observed timestamp, not a first-seen one.
    pub discovered_at: DateTime<Utc>,
    /// Location fix captured with this observation, if available.
    pub location: Option<LocationData>,
    /// Raw manufacturer-specific bytes from the advertisement.
    pub manufacturer_data: Option<Vec<u8>>,
    /// Advertised service identifiers, in advertisement order.
    pub service_uuids: Option<Vec<Uuid>>,
    /// Per-service advertisement payloads.
    pub service_data: Option<HashMap<Uuid, Vec<u8>>>,
    /// Advertised transmit power hint, in dBm.
    pub tx_power_level: Option<i16>,
    /// Whether the advertisement flagged the device as connectable.
    pub is_connectable: Option<bool>,
}

impl BleDevice {
    /// Returns the advertised data in a human-readable, multi-line format.
    pub fn advertised_data_description(&self) -> String {
        let mut result: Vec<String> = Vec::new();

        if let Some(name) = &self.name {
            result.push(format!("Name: {name}"));
        }

        result.push(format!("RSSI: {} dBm", self.rssi));

        if let Some(connectable) = self.is_connectable {
            result.push(format!(
                "Connectable: {}",
                if connectable { "Yes" } else { "No" }
            ));
        }

        if let Some(tx_power) = self.tx_power_level {
            result.push(format!("TX Power: {tx_power} dBm"));
        }

        if let Some(services) = &self.service_uuids {
            if !services.is_empty() {
                let joined = services
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                result.push(format!("Services: {joined}"));
            }
        }

        if let Some(mfg_data) = &self.manufacturer_data {
            result.push(format!("Manufacturer Data: {}", hex_string(mfg_data)));
        }

        if let Some(svc_data) = &self.service_data {
            // Sorted so the rendering is stable across map iterations.
            let mut entries: Vec<_> = svc_data.iter().collect();
            entries.sort_by_key(|(uuid, _)| *uuid);
            for (uuid, data) in entries {
                result.push(format!("Service {uuid}: {}", hex_string(data)));
            }
        }

        result.join("\n")
    }
}

/// Lowercase hex rendering of a byte slice.
fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
