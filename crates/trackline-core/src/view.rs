// ── Read-only device views ──
//
// Trackers and sensors are independent views over one shared snapshot.
// None of them copy device data; each holds the `Arc<DeviceSnapshot>` it
// was created from plus the device's position in it.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use trackline_api::TrackerDevice;

use crate::snapshot::DeviceSnapshot;

// ── Lookup capability ────────────────────────────────────────────

/// Anything that can hand out the current snapshot.
pub trait DeviceLookup {
    fn snapshot(&self) -> Arc<DeviceSnapshot>;

    /// Tracker view for the device with this uuid, if present.
    fn tracker(&self, uuid: &str) -> Option<TrackerView> {
        TrackerView::find(self.snapshot(), uuid)
    }

    /// One tracker view per device, in portal order.
    fn trackers(&self) -> Vec<TrackerView> {
        let snapshot = self.snapshot();
        (0..snapshot.len())
            .map(|index| TrackerView {
                snapshot: Arc::clone(&snapshot),
                index,
            })
            .collect()
    }

    /// Every sensor of every device.
    fn sensors(&self) -> Vec<SensorReading> {
        self.trackers().iter().flat_map(TrackerView::sensors).collect()
    }
}

impl DeviceLookup for Arc<DeviceSnapshot> {
    fn snapshot(&self) -> Arc<DeviceSnapshot> {
        Arc::clone(self)
    }
}

// ── Tracker ──────────────────────────────────────────────────────

/// Position-centric view of one device.
#[derive(Debug, Clone)]
pub struct TrackerView {
    snapshot: Arc<DeviceSnapshot>,
    index: usize,
}

/// The fields whose change makes a tracker worth re-rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

impl TrackerView {
    pub fn find(snapshot: Arc<DeviceSnapshot>, uuid: &str) -> Option<Self> {
        let index = snapshot.iter().position(|d| d.uuid == uuid)?;
        Some(Self { snapshot, index })
    }

    pub fn device(&self) -> &TrackerDevice {
        // The index was taken from this same immutable snapshot.
        &self.snapshot.devices()[self.index]
    }

    pub fn uuid(&self) -> &str {
        &self.device().uuid
    }

    pub fn name(&self) -> &str {
        self.device().display_name()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.device().last_location.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.device().last_location.longitude
    }

    /// `(latitude, longitude)`, or `None` until the watch has reported both.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude().zip(self.longitude())
    }

    /// GPS accuracy in metres.
    pub fn accuracy(&self) -> Option<f64> {
        self.device().last_location.accuracy
    }

    pub fn battery_level(&self) -> Option<i64> {
        self.device().last_location.battery_percentage
    }

    pub fn address(&self) -> Option<&str> {
        self.device().last_location.address.as_deref()
    }

    pub fn fix(&self) -> LocationFix {
        LocationFix {
            latitude: self.latitude(),
            longitude: self.longitude(),
            address: self.address().map(str::to_owned),
        }
    }

    /// Whether position or address differ from an earlier fix.
    pub fn has_moved_since(&self, previous: &LocationFix) -> bool {
        self.fix() != *previous
    }

    /// Every sensor this device exposes.
    pub fn sensors(&self) -> Vec<SensorReading> {
        SensorKind::iter()
            .map(|kind| SensorReading {
                tracker: self.clone(),
                kind,
            })
            .collect()
    }

    pub fn sensor(&self, kind: SensorKind) -> SensorReading {
        SensorReading {
            tracker: self.clone(),
            kind,
        }
    }
}

// ── Sensors ──────────────────────────────────────────────────────

/// A single `last_location` attribute exposed as a standalone reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    #[strum(serialize = "battery_percentage")]
    #[serde(rename = "battery_percentage")]
    Battery,
    SignalStrength,
    SatelliteCount,
    Accuracy,
    Altitude,
    LocationType,
    LastCommunication,
}

impl SensorKind {
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::Battery => Some("%"),
            Self::Accuracy | Self::Altitude => Some("m"),
            Self::SignalStrength
            | Self::SatelliteCount
            | Self::LocationType
            | Self::LastCommunication => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Battery => "Battery",
            Self::SignalStrength => "Signal strength",
            Self::SatelliteCount => "Satellites",
            Self::Accuracy => "GPS accuracy",
            Self::Altitude => "Altitude",
            Self::LocationType => "Location type",
            Self::LastCommunication => "Last communication",
        }
    }
}

/// A sensor value, typed as the portal reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// One sensor of one device.
#[derive(Debug, Clone)]
pub struct SensorReading {
    tracker: TrackerView,
    kind: SensorKind,
}

impl SensorReading {
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn device_uuid(&self) -> &str {
        self.tracker.uuid()
    }

    /// Stable identifier: device uuid plus attribute name.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.tracker.uuid(), self.kind)
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.tracker.name(), self.kind.label())
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.kind.unit()
    }

    pub fn value(&self) -> Option<SensorValue> {
        let loc = &self.tracker.device().last_location;
        match self.kind {
            SensorKind::Battery => loc.battery_percentage.map(SensorValue::Integer),
            SensorKind::SignalStrength => loc.signal_strength.map(SensorValue::Integer),
            SensorKind::SatelliteCount => loc.satellite_count.map(SensorValue::Integer),
            SensorKind::Accuracy => loc.accuracy.map(SensorValue::Float),
            SensorKind::Altitude => loc.altitude.map(SensorValue::Float),
            SensorKind::LocationType => loc.location_type.clone().map(SensorValue::Text),
            SensorKind::LastCommunication => {
                loc.last_communication.clone().map(SensorValue::Text)
            }
        }
    }
}
