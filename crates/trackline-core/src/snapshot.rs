// ── Device snapshot ──
//
// The full device list as of one successful poll. Replaced wholesale,
// never patched. Consumers hold it behind an `Arc` and read it lock-free.

use chrono::{DateTime, Utc};
use serde::Serialize;

use trackline_api::TrackerDevice;

/// Ordered device list plus the instant it was fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    devices: Vec<TrackerDevice>,
    /// `None` until the first successful poll.
    fetched_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn new(devices: Vec<TrackerDevice>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            devices,
            fetched_at: Some(fetched_at),
        }
    }

    /// Devices in portal order.
    pub fn devices(&self) -> &[TrackerDevice] {
        &self.devices
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Whether any poll has ever succeeded.
    pub fn is_populated(&self) -> bool {
        self.fetched_at.is_some()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackerDevice> {
        self.devices.iter()
    }

    /// Look a device up by uuid, then by exact name, then by
    /// case-insensitive name.
    pub fn resolve(&self, identifier: &str) -> Option<&TrackerDevice> {
        self.devices
            .iter()
            .find(|d| d.uuid == identifier)
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.name.as_deref() == Some(identifier))
            })
            .or_else(|| {
                self.devices.iter().find(|d| {
                    d.name
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(identifier))
                })
            })
    }
}

impl<'a> IntoIterator for &'a DeviceSnapshot {
    type Item = &'a TrackerDevice;
    type IntoIter = std::slice::Iter<'a, TrackerDevice>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}
