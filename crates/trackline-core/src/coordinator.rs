// ── Polling coordinator ──
//
// Drives a `DeviceSource` on a fixed cadence and publishes the latest
// snapshot through `watch` channels. The source sits behind one async
// mutex: scheduled cycles, on-demand refreshes and commands all serialize
// on it, so no two portal interactions ever overlap.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trackline_api::{GpsClient, Refresh};

use crate::command::{Command, CommandResult};
use crate::config::{CoordinatorConfig, PollSettings};
use crate::error::CoreError;
use crate::snapshot::DeviceSnapshot;
use crate::source::DeviceSource;
use crate::view::DeviceLookup;

// ── CoordinatorState ─────────────────────────────────────────────

/// Health of the polling loop, observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No cycle has completed yet.
    Uninitialized,
    /// A cycle is in flight.
    Refreshing,
    /// The last cycle succeeded.
    Ready,
    /// The last cycle failed; the snapshot is from an earlier success.
    Stale { reason: String, failures: u32 },
}

impl CoordinatorState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Refreshing => f.write_str("refreshing"),
            Self::Ready => f.write_str("ready"),
            Self::Stale { reason, failures } => {
                write!(f, "stale ({failures} failed cycles): {reason}")
            }
        }
    }
}

// ── Coordinator ──────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<Inner>`. Owns the source exclusively; readers
/// only ever see snapshots.
pub struct Coordinator<S: DeviceSource> {
    inner: Arc<Inner<S>>,
}

impl<S: DeviceSource> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    settings: PollSettings,
    /// `None` once shut down.
    source: Mutex<Option<S>>,
    snapshot: watch::Sender<Arc<DeviceSnapshot>>,
    state: watch::Sender<CoordinatorState>,
    /// Single stored permit: repeated requests coalesce into one cycle.
    refresh_wanted: Notify,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator<GpsClient> {
    /// Build a coordinator around a fresh session client. Does NOT log in;
    /// call [`start()`](Self::start).
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self, CoreError> {
        Ok(Self::new(config.build_client()?, config.poll))
    }
}

impl<S: DeviceSource> Coordinator<S> {
    pub fn new(source: S, settings: PollSettings) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(DeviceSnapshot::default()));
        let (state, _) = watch::channel(CoordinatorState::Uninitialized);

        Self {
            inner: Arc::new(Inner {
                settings,
                source: Mutex::new(Some(source)),
                snapshot,
                state,
                refresh_wanted: Notify::new(),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.inner.settings
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Log in, load the first snapshot, and spawn the polling task.
    ///
    /// Login failure aborts startup. A failed first refresh does not: the
    /// coordinator starts `Stale` and the next cycle retries.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.install().await?;

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "initial refresh failed, starting stale");
        }

        let period = self.inner.settings.update_interval;
        if period.is_zero() {
            debug!("update interval is zero, not spawning poller");
            return Ok(());
        }

        let mut task = self.inner.task.lock().await;
        if task.is_none() {
            let coordinator = self.clone();
            let cancel = self.inner.cancel.child_token();
            *task = Some(tokio::spawn(poll_task(coordinator, period, cancel)));
            info!(interval_secs = period.as_secs(), "polling started");
        }
        Ok(())
    }

    /// Stop polling and close the source. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }

        if let Some(mut source) = self.inner.source.lock().await.take() {
            source.close();
            debug!("coordinator shut down");
        }
    }

    /// Log in and resolve the account id, bounded by the cycle timeout.
    pub async fn install(&self) -> Result<String, CoreError> {
        let timeout = self.inner.settings.cycle_timeout;
        let mut guard = self.inner.source.lock().await;
        let source = guard.as_mut().ok_or(CoreError::NotStarted)?;

        let account_id = tokio::time::timeout(timeout, source.install())
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })??;
        info!(account_id = %account_id, "portal session established");
        Ok(account_id)
    }

    /// One-shot: log in, load one snapshot, run closure, shut down.
    ///
    /// Optimized for CLI: no background task, and a failed first refresh
    /// is an error instead of a stale start.
    pub async fn oneshot<F, Fut, T>(source: S, settings: PollSettings, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator<S>) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let settings = PollSettings {
            update_interval: Duration::ZERO,
            ..settings
        };
        let coordinator = Self::new(source, settings);

        let result = match coordinator.install().await {
            Ok(_) => match coordinator.refresh().await {
                Ok(_) => f(coordinator.clone()).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        coordinator.shutdown().await;
        result
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run a cycle now, waiting for any cycle already in flight first.
    ///
    /// Returns the fresh snapshot. On failure the previous snapshot stays
    /// published and the state turns `Stale`.
    pub async fn refresh(&self) -> Result<Arc<DeviceSnapshot>, CoreError> {
        let mut guard = self.inner.source.lock().await;
        let source = guard.as_mut().ok_or(CoreError::NotStarted)?;

        let prior_failures = match self.inner.state.send_replace(CoordinatorState::Refreshing) {
            CoordinatorState::Stale { failures, .. } => failures,
            _ => 0,
        };
        let timeout = self.inner.settings.cycle_timeout;

        let outcome = match tokio::time::timeout(timeout, source.update()).await {
            Ok(Ok(Refresh::Devices(devices))) => Ok(devices),
            Ok(Ok(Refresh::SessionExpired { status })) => Err(CoreError::RefreshFailed {
                reason: format!("portal rejected the session (HTTP {status})"),
            }),
            Ok(Ok(Refresh::Malformed { message })) => Err(CoreError::RefreshFailed {
                reason: format!("unreadable device list: {message}"),
            }),
            Ok(Err(e)) => {
                if e.is_auth_failure() {
                    warn!(error = %e, "portal rejected the credentials");
                }
                Err(CoreError::from(e))
            }
            Err(_) => Err(CoreError::CycleTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        };
        drop(guard);

        match outcome {
            Ok(devices) => {
                let snapshot = Arc::new(DeviceSnapshot::new(devices, Utc::now()));
                debug!(devices = snapshot.len(), "snapshot published");
                self.inner.snapshot.send_replace(Arc::clone(&snapshot));
                self.inner.state.send_replace(CoordinatorState::Ready);
                Ok(snapshot)
            }
            Err(e) => {
                self.mark_stale(&e, prior_failures.saturating_add(1));
                Err(e)
            }
        }
    }

    /// Ask the poller for an out-of-cycle refresh. Returns immediately;
    /// requests made while one is pending are merged into it.
    pub fn request_refresh(&self) {
        self.inner.refresh_wanted.notify_one();
    }

    fn mark_stale(&self, error: &CoreError, failures: u32) {
        let reason = error.to_string();
        self.inner.state.send_replace(CoordinatorState::Stale {
            reason: reason.clone(),
            failures,
        });
        warn!(failures, reason = %reason, "update cycle failed, keeping last snapshot");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Execute a command against the portal.
    ///
    /// The device may be named by uuid or by name once a snapshot exists.
    /// A completed command schedules an out-of-cycle refresh.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let cmd = self.resolve_target(cmd)?;
        let device_id = cmd.device_id().to_owned();
        let timeout = self.inner.settings.cycle_timeout;

        let mut guard = self.inner.source.lock().await;
        let source = guard.as_mut().ok_or(CoreError::NotStarted)?;

        debug!(command = cmd.label(), device_id = %device_id, "executing command");
        let call = async {
            match &cmd {
                Command::RefreshLocation { .. } | Command::PowerOff { .. } => {
                    let code = cmd.code().unwrap_or_default();
                    source.send_command(&device_id, code, None, None).await
                }
                Command::SendMessage { message, .. } => {
                    source.send_message(&device_id, message).await
                }
                Command::Function {
                    code,
                    value,
                    value_param,
                    ..
                } => {
                    source
                        .send_command(&device_id, code, value.as_deref(), value_param.as_deref())
                        .await
                }
            }
        };

        let accepted = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })??;
        drop(guard);

        if accepted {
            self.request_refresh();
        }
        Ok(CommandResult {
            device_id,
            accepted,
        })
    }

    /// Map a device name to its uuid when a snapshot is available.
    fn resolve_target(&self, cmd: Command) -> Result<Command, CoreError> {
        let snapshot = self.snapshot();
        if !snapshot.is_populated() {
            return Ok(cmd);
        }
        let uuid = snapshot
            .resolve(cmd.device_id())
            .map(|d| d.uuid.clone())
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: cmd.device_id().to_owned(),
            })?;
        Ok(cmd.with_device_id(uuid))
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to health changes.
    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> CoordinatorState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to snapshot replacements.
    pub fn snapshots(&self) -> watch::Receiver<Arc<DeviceSnapshot>> {
        self.inner.snapshot.subscribe()
    }
}

impl<S: DeviceSource> DeviceLookup for Coordinator<S> {
    fn snapshot(&self) -> Arc<DeviceSnapshot> {
        Arc::clone(&self.inner.snapshot.borrow())
    }
}

// ── Background task ──────────────────────────────────────────────

/// Fixed-cadence poller. Also serves coalesced on-demand requests.
async fn poll_task<S: DeviceSource>(
    coordinator: Coordinator<S>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = coordinator.inner.refresh_wanted.notified() => {
                debug!("on-demand refresh");
            }
            _ = interval.tick() => {
                debug!("scheduled refresh");
            }
        }

        // Dropping an in-flight cycle is safe: nothing commits to the
        // session until the portal has answered.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = coordinator.refresh() => {
                match result {
                    Ok(_) => {}
                    Err(e) if e.is_retryable() => debug!(error = %e, "cycle failed, retrying next tick"),
                    Err(e) => warn!(error = %e, "cycle failed with a non-retryable error"),
                }
            }
        }
    }

    debug!("poll task exiting");
}
