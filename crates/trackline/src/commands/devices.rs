//! Device listing and sensor handlers.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use trackline_core::{
    DeviceLookup, DeviceSnapshot, SensorKind, SensorReading, SensorValue, TrackerDevice,
    TrackerView,
};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

/// `"lat, lon"` to five decimals, or `-` without a fix.
pub(crate) fn position(fix: Option<(f64, f64)>) -> String {
    fix.map_or_else(|| "-".into(), |(lat, lon)| format!("{lat:.5}, {lon:.5}"))
}

fn device_row(d: &TrackerDevice, color: bool) -> DeviceRow {
    let loc = &d.last_location;
    DeviceRow {
        name: d.display_name().to_owned(),
        uuid: d.uuid.clone(),
        status: d.status.clone().unwrap_or_else(|| "-".into()),
        battery: output::paint_battery(loc.battery_percentage, color),
        position: position(loc.latitude.zip(loc.longitude)),
        address: loc.address.clone().unwrap_or_default(),
        last_seen: loc.last_communication.clone().unwrap_or_else(|| "-".into()),
    }
}

fn detail(tracker: &TrackerView, color: bool) -> String {
    let d = tracker.device();
    let loc = &d.last_location;
    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_owned();

    let mut pairs = vec![
        ("UUID:", d.uuid.clone()),
        ("Name:", tracker.name().to_owned()),
        ("Serial:", or_dash(d.serial_number.as_deref())),
        ("Phone:", or_dash(d.phone_number.as_deref())),
        ("Status:", or_dash(d.status.as_deref())),
        ("Position:", position(tracker.position())),
        (
            "Accuracy:",
            tracker
                .accuracy()
                .map_or_else(|| "-".into(), |m| format!("{m} m")),
        ),
        ("Address:", or_dash(tracker.address())),
        (
            "Battery:",
            output::paint_battery(tracker.battery_level(), color),
        ),
        ("Location type:", or_dash(loc.location_type.as_deref())),
        ("Last seen:", or_dash(loc.last_communication.as_deref())),
        ("Last fix:", or_dash(loc.last_location_update.as_deref())),
    ];
    if let Some(ref tariff) = d.simcard.tariff_type {
        pairs.push(("SIM tariff:", tariff.clone()));
    }
    if let Some(cents) = d.simcard.balance_cents {
        pairs.push(("SIM balance:", format!("{:.2}", cents_to_units(cents))));
    }
    output::detail_block(&pairs)
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn cents_to_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

// ── Sensors ─────────────────────────────────────────────────────────

/// Serialized form of one sensor reading.
#[derive(Serialize)]
struct SensorEntry {
    id: String,
    device: String,
    name: String,
    kind: SensorKind,
    value: Option<SensorValue>,
    unit: Option<&'static str>,
}

impl From<&SensorReading> for SensorEntry {
    fn from(r: &SensorReading) -> Self {
        Self {
            id: r.unique_id(),
            device: r.device_uuid().to_owned(),
            name: r.name(),
            kind: r.kind(),
            value: r.value(),
            unit: r.unit(),
        }
    }
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Sensor")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<&SensorEntry> for SensorRow {
    fn from(e: &SensorEntry) -> Self {
        let value = match (&e.value, e.unit) {
            (None, _) => "-".into(),
            (Some(v), Some(unit)) => format!("{v} {unit}"),
            (Some(v), None) => v.to_string(),
        };
        Self {
            name: e.name.clone(),
            value,
            id: e.id.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

fn find<'a>(snapshot: &'a DeviceSnapshot, identifier: &str) -> Result<&'a TrackerDevice, CliError> {
    snapshot.resolve(identifier).ok_or_else(|| CliError::NotFound {
        resource_type: "device".into(),
        identifier: identifier.into(),
        list_command: "devices list".into(),
    })
}

pub fn handle(
    snapshot: &Arc<DeviceSnapshot>,
    args: DevicesArgs,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let rendered = match args.command {
        DevicesCommand::List => output::render_list(
            &global.output,
            snapshot.devices(),
            |d| device_row(d, color),
            |d| d.uuid.clone(),
        )?,

        DevicesCommand::Get { device } => {
            let uuid = find(snapshot, &device)?.uuid.clone();
            let tracker = snapshot.tracker(&uuid).ok_or(CliError::NotFound {
                resource_type: "device".into(),
                identifier: device,
                list_command: "devices list".into(),
            })?;
            output::render_single(
                &global.output,
                tracker.device(),
                |_| detail(&tracker, color),
                |d| d.uuid.clone(),
            )?
        }

        DevicesCommand::Sensors { device } => {
            let readings = match device {
                Some(ref identifier) => {
                    let uuid = find(snapshot, identifier)?.uuid.clone();
                    snapshot
                        .tracker(&uuid)
                        .map(|t| t.sensors())
                        .unwrap_or_default()
                }
                None => snapshot.sensors(),
            };
            let entries: Vec<SensorEntry> = readings.iter().map(SensorEntry::from).collect();
            output::render_list(&global.output, &entries, |e| SensorRow::from(e), |e| e.id.clone())?
        }
    };

    output::print_output(&rendered, global.quiet);
    Ok(())
}
