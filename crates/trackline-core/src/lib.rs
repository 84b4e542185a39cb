//! Polling layer between `trackline-api` and its consumers.
//!
//! - **[`Coordinator`]**: owns one [`DeviceSource`] (normally a
//!   [`GpsClient`](trackline_api::GpsClient)), runs an update cycle on a
//!   fixed cadence, and publishes each [`DeviceSnapshot`] and its
//!   [`CoordinatorState`] through `tokio::sync::watch` channels. Failed
//!   cycles keep the previous snapshot and mark the coordinator `Stale`.
//!
//! - **[`Command`]**: device functions and messages, routed through the
//!   same exclusively-owned source as the polling cycles.
//!
//! - **Views** ([`view`]): [`TrackerView`] and [`SensorReading`] are
//!   read-only projections over a shared snapshot, reached through the
//!   [`DeviceLookup`] capability.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod snapshot;
pub mod source;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{CoordinatorConfig, PollSettings};
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::CoreError;
pub use snapshot::DeviceSnapshot;
pub use source::DeviceSource;
pub use view::{DeviceLookup, LocationFix, SensorKind, SensorReading, SensorValue, TrackerView};

pub use trackline_api::{FunctionCode, TrackerDevice};
