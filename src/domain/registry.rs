//! Canonical in-memory registry of discovered devices.
//!
//! The registry owns the only map of device records. It is written to from
//! the radio adapter's delivery context and read from arbitrary caller
//! threads, so the map lives behind a mutex and every read hands back a
//! copy. Records stay in the registry until [`DeviceRegistry::clear`] is
//! called; there is no staleness eviction.

use crate::domain::models::{BleDevice, DeviceId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Result of feeding a candidate record into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The identifier was not present; a record was inserted.
    Discovered,
    /// The identifier was present; the record was wholesale replaced.
    Updated,
}

struct StoredDevice {
    device: BleDevice,
    /// Monotonic sequence assigned at first insert and retained across
    /// replacements. Breaks `discovered_at` ties in snapshots.
    insert_seq: u64,
}

#[derive(Default)]
struct RegistryInner {
    devices: HashMap<DeviceId, StoredDevice>,
    next_seq: u64,
}

/// Map from device identifier to the latest observed record.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: Mutex<RegistryInner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the candidate if its identifier is new, otherwise replaces
    /// the stored record entirely, `discovered_at` included. This single
    /// branch is the whole dedup policy; nothing is merged.
    pub fn upsert(&self, device: BleDevice) -> UpsertOutcome {
        let mut inner = self.inner.lock().unwrap();
        match inner.devices.get_mut(&device.id) {
            Some(stored) => {
                stored.device = device;
                UpsertOutcome::Updated
            }
            None => {
                let insert_seq = inner.next_seq;
                inner.next_seq += 1;
                inner
                    .devices
                    .insert(device.id, StoredDevice { device, insert_seq });
                UpsertOutcome::Discovered
            }
        }
    }

    /// Point lookup by identifier.
    pub fn get(&self, id: DeviceId) -> Option<BleDevice> {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(&id)
            .map(|stored| stored.device.clone())
    }

    /// All current records, most recently observed first.
    ///
    /// Records sharing the same `discovered_at` are ordered by insertion,
    /// oldest insert first, so snapshots are deterministic regardless of
    /// map iteration order.
    pub fn snapshot(&self) -> Vec<BleDevice> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<&StoredDevice> = inner.devices.values().collect();
        entries.sort_by(|a, b| {
            b.device
                .discovered_at
                .cmp(&a.device.discovered_at)
                .then(a.insert_seq.cmp(&b.insert_seq))
        });
        entries
            .into_iter()
            .map(|stored| stored.device.clone())
            .collect()
    }

    /// Empties the registry. Emits nothing and touches no other state.
    pub fn clear(&self) {
        self.inner.lock().unwrap().devices.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
