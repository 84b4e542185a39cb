// Portal response types
//
// The device list endpoint returns `[{"device": {...}}, ...]`. Fields use
// `#[serde(default)]` liberally and numeric fields accept either JSON
// numbers or numeric strings: the portal is not consistent about either.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Function codes ───────────────────────────────────────────────────

/// Well-known device function codes for [`send_command`](crate::GpsClient::send_command).
pub struct FunctionCode;

impl FunctionCode {
    /// Ask the watch for an immediate GPS fix.
    pub const REFRESH_LOCATION: &'static str = "0039";
    /// Switch the watch off remotely.
    pub const POWER_OFF: &'static str = "0048";
}

// ── Device list envelope ─────────────────────────────────────────────

/// One element of the device-list array.
#[derive(Debug, Deserialize)]
pub struct DeviceWrapper {
    pub device: TrackerDevice,
}

// ── Device ───────────────────────────────────────────────────────────

/// A GPS watch as reported by the portal. Identity key is `uuid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerDevice {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub simcard: SimCard,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_location: LastLocation,
    /// Catch-all for fields not modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TrackerDevice {
    /// Human-facing name, falling back to the uuid for unnamed watches.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.uuid)
    }
}

/// Prepaid SIM details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimCard {
    #[serde(default)]
    pub tariff_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub balance_cents: Option<i64>,
}

/// Most recent fix and link state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub altitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub battery_percentage: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub signal_strength: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub satellite_count: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub last_communication: Option<String>,
    #[serde(default)]
    pub last_location_update: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub port: Option<i64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Number-or-string field decoding. Unparseable values become `None`
/// rather than failing the whole device list.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_device_decodes() {
        let raw = json!({
            "device": {
                "uuid": "0a078c6a-6433-4439-9e5e-5f9726e54f2a",
                "name": "Kid",
                "serial_number": "865000000000001",
                "phone_number": "+31612345678",
                "status": "GPS",
                "simcard": { "tariff_type": "prepaid", "balance_cents": 1250 },
                "last_location": {
                    "latitude": "52.0907",
                    "longitude": 5.1214,
                    "accuracy": 10,
                    "altitude": "3.5",
                    "battery_percentage": "87",
                    "signal_strength": 4,
                    "satellite_count": 9,
                    "address": "Domplein, Utrecht",
                    "location_type": "GPS",
                    "last_communication": "2024-06-15T10:30:00.000+02:00",
                    "last_location_update": "2024-06-15T10:29:00.000+02:00",
                    "host": "10.1.2.3",
                    "port": "7700"
                },
                "firmware": "v2"
            }
        });

        let wrapper: DeviceWrapper = serde_json::from_value(raw).unwrap();
        let d = wrapper.device;
        assert_eq!(d.display_name(), "Kid");
        assert_eq!(d.simcard.balance_cents, Some(1250));
        assert_eq!(d.last_location.latitude, Some(52.0907));
        assert_eq!(d.last_location.longitude, Some(5.1214));
        assert_eq!(d.last_location.battery_percentage, Some(87));
        assert_eq!(d.last_location.port, Some(7700));
        assert_eq!(d.extra.get("firmware"), Some(&json!("v2")));
    }

    #[test]
    fn sparse_device_decodes() {
        let raw = json!({ "uuid": "abc", "simcard": null, "last_location": null });
        let d: TrackerDevice = serde_json::from_value(raw).unwrap();
        assert_eq!(d.display_name(), "abc");
        assert_eq!(d.simcard, SimCard::default());
        assert_eq!(d.last_location, LastLocation::default());
    }

    #[test]
    fn garbage_numbers_become_none() {
        let raw = json!({
            "uuid": "abc",
            "phone_number": 31612345678_u64,
            "last_location": { "latitude": "n/a", "battery_percentage": true }
        });
        let d: TrackerDevice = serde_json::from_value(raw).unwrap();
        assert_eq!(d.phone_number.as_deref(), Some("31612345678"));
        assert_eq!(d.last_location.latitude, None);
        assert_eq!(d.last_location.battery_percentage, None);
    }

    #[test]
    fn missing_uuid_is_an_error() {
        let raw = json!({ "name": "Kid" });
        assert!(serde_json::from_value::<TrackerDevice>(raw).is_err());
    }
}
