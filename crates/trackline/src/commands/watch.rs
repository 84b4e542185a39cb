//! `trackline watch`: run the polling coordinator in the foreground and
//! stream position changes until interrupted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::debug;

use trackline_core::{
    Coordinator, CoordinatorConfig, CoordinatorState, DeviceLookup, DeviceSnapshot, LocationFix,
    TrackerDevice, TrackerView,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Movement filter ─────────────────────────────────────────────────

/// Remembers the last fix per device and picks the trackers worth printing.
#[derive(Debug, Default)]
struct MovementFilter {
    last: HashMap<String, LocationFix>,
    all: bool,
}

impl MovementFilter {
    fn new(all: bool) -> Self {
        Self {
            last: HashMap::new(),
            all,
        }
    }

    fn select(&mut self, snapshot: &Arc<DeviceSnapshot>) -> Vec<TrackerView> {
        snapshot
            .trackers()
            .into_iter()
            .filter(|tracker| {
                let moved = self
                    .last
                    .get(tracker.uuid())
                    .is_none_or(|prev| tracker.has_moved_since(prev));
                if moved {
                    self.last.insert(tracker.uuid().to_owned(), tracker.fix());
                }
                moved || self.all
            })
            .collect()
    }
}

// ── Rendering ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct WatchEvent<'a> {
    fetched_at: Option<DateTime<Utc>>,
    device: &'a TrackerDevice,
}

fn render_line(tracker: &TrackerView, fetched_at: Option<DateTime<Utc>>, color: bool) -> String {
    let time = fetched_at.map_or_else(
        || "--:--:--".to_owned(),
        |t| t.with_timezone(&Local).format("%H:%M:%S").to_string(),
    );
    let mut line = format!(
        "[{time}] {}  {}",
        tracker.name(),
        super::devices::position(tracker.position())
    );
    if let Some(address) = tracker.address() {
        line.push_str("  ");
        line.push_str(address);
    }
    line.push_str(&format!(
        "  (battery {})",
        output::paint_battery(tracker.battery_level(), color)
    ));
    line
}

fn render_events(
    format: &OutputFormat,
    trackers: &[TrackerView],
    fetched_at: Option<DateTime<Utc>>,
    color: bool,
) -> Result<Vec<String>, CliError> {
    trackers
        .iter()
        .map(|tracker| {
            let event = WatchEvent {
                fetched_at,
                device: tracker.device(),
            };
            match format {
                OutputFormat::Table => Ok(render_line(tracker, fetched_at, color)),
                // One object per line so the stream stays parseable.
                OutputFormat::Json | OutputFormat::JsonCompact => {
                    output::render_json(&event, true)
                }
                OutputFormat::Yaml => Ok(format!("---\n{}", serde_yaml::to_string(&event)?)),
                OutputFormat::Plain => {
                    let coord =
                        |v: Option<f64>| v.map_or_else(|| "-".to_owned(), |v| v.to_string());
                    Ok(format!(
                        "{} {} {}",
                        tracker.uuid(),
                        coord(tracker.latitude()),
                        coord(tracker.longitude())
                    ))
                }
            }
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: WatchArgs,
    mut cfg: CoordinatorConfig,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        cfg.poll.update_interval = Duration::from_secs(secs);
    }
    if cfg.poll.update_interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "watch needs a polling interval of at least 1 second".into(),
        });
    }

    let coordinator = Coordinator::from_config(&cfg)?;
    let spin = util::spinner("Logging in to the portal", global.quiet);
    let started = coordinator.start().await;
    spin.finish_and_clear();
    if let Err(e) = started {
        coordinator.shutdown().await;
        return Err(e.into());
    }

    if !global.quiet {
        eprintln!(
            "Polling every {}, press Ctrl-C to stop",
            humantime::format_duration(cfg.poll.update_interval)
        );
    }

    let result = stream(&coordinator, &args, global, color).await;
    coordinator.shutdown().await;
    result
}

async fn stream<S: trackline_core::DeviceSource>(
    coordinator: &Coordinator<S>,
    args: &WatchArgs,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let mut snapshots = coordinator.snapshots();
    let mut states = coordinator.state();
    let mut filter = MovementFilter::new(args.all);
    let mut seen: u32 = 0;
    let mut was_stale = coordinator.current_state().is_stale();

    let mut emit = |snapshot: &Arc<DeviceSnapshot>| -> Result<(), CliError> {
        let moved = filter.select(snapshot);
        for line in render_events(&global.output, &moved, snapshot.fetched_at(), color)? {
            output::print_output(&line, global.quiet);
        }
        Ok(())
    };

    // start() already published the first snapshot, unless it came up stale.
    let first = Arc::clone(&snapshots.borrow_and_update());
    if first.is_populated() {
        emit(&first)?;
        seen += 1;
    } else if was_stale && !global.quiet {
        eprintln!("{}", output::paint_state(&coordinator.current_state(), color));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if args.count.is_some_and(|n| seen >= n) {
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                emit(&snapshot)?;
                seen += 1;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                let report = match state {
                    CoordinatorState::Stale { .. } => true,
                    CoordinatorState::Ready => was_stale,
                    CoordinatorState::Uninitialized | CoordinatorState::Refreshing => false,
                };
                if report && !global.quiet {
                    eprintln!("{}", output::paint_state(&state, color));
                }
                if !matches!(state, CoordinatorState::Refreshing) {
                    was_stale = state.is_stale();
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(lat: f64) -> Arc<DeviceSnapshot> {
        let devices = serde_json::from_value(serde_json::json!([
            { "uuid": "u-1", "name": "Emma", "last_location": { "latitude": lat, "longitude": 5.1 } },
            { "uuid": "u-2", "name": "Noah", "last_location": { "latitude": 51.0, "longitude": 4.0 } }
        ]))
        .unwrap();
        Arc::new(DeviceSnapshot::new(devices, Utc::now()))
    }

    fn uuids(trackers: &[TrackerView]) -> Vec<&str> {
        trackers.iter().map(TrackerView::uuid).collect()
    }

    #[test]
    fn only_moved_trackers_are_selected() {
        let mut filter = MovementFilter::new(false);

        assert_eq!(uuids(&filter.select(&snapshot(52.0))), ["u-1", "u-2"]);
        assert!(filter.select(&snapshot(52.0)).is_empty());
        assert_eq!(uuids(&filter.select(&snapshot(52.5))), ["u-1"]);
    }

    #[test]
    fn all_flag_selects_every_tracker() {
        let mut filter = MovementFilter::new(true);
        filter.select(&snapshot(52.0));
        assert_eq!(filter.select(&snapshot(52.0)).len(), 2);
    }

    #[test]
    fn plain_event_is_uuid_and_coordinates() {
        let snap = snapshot(52.0);
        let trackers = snap.trackers();
        let lines = render_events(&OutputFormat::Plain, &trackers[..1], None, false).unwrap();
        assert_eq!(lines, ["u-1 52 5.1"]);
    }

    #[test]
    fn unlocated_tracker_renders_dashes() {
        let devices = serde_json::from_value(serde_json::json!([
            { "uuid": "u-3", "name": "Mila", "last_location": null }
        ]))
        .unwrap();
        let snap = Arc::new(DeviceSnapshot::new(devices, Utc::now()));
        let trackers = snap.trackers();

        let plain = render_events(&OutputFormat::Plain, &trackers, None, false).unwrap();
        assert_eq!(plain, ["u-3 - -"]);

        let line = render_line(&trackers[0], None, false);
        assert!(line.contains("Mila  -"), "{line}");
        assert!(!line.contains("0.00000"), "{line}");
    }

    #[test]
    fn json_events_are_single_line() {
        let snap = snapshot(52.0);
        let lines =
            render_events(&OutputFormat::Json, &snap.trackers(), snap.fetched_at(), false).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.contains('\n')));
        assert!(lines[0].contains(r#""uuid":"u-1""#));
    }
}
