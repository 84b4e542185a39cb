// ── Runtime connection configuration ──
//
// These types describe how to reach the portal and how often to poll.
// They carry credential data and timing, but never touch disk. The CLI
// constructs a `CoordinatorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use trackline_api::{Credentials, Endpoints, GpsClient, TlsMode, TransportConfig};

use crate::error::CoreError;

/// Default polling cadence.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
/// Default upper bound for one update cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(300);
/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between scheduled cycles. Zero disables the background task.
    pub update_interval: Duration,
    /// Bound on a single cycle (and on setup and commands).
    pub cycle_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

/// Everything needed to build a session client and poll it.
///
/// Built by the CLI, passed to the coordinator. Core never reads config files.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub username: String,
    pub password: SecretString,
    /// Expected account id. May be empty; the portal's redirect decides.
    pub account_id: String,
    /// Portal origin override. `None` means the public portal.
    pub base_url: Option<Url>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Extra CA certificate (PEM) to trust, for mirrors behind a private CA.
    pub ca_cert: Option<PathBuf>,
    pub poll: PollSettings,
}

impl CoordinatorConfig {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            account_id: String::new(),
            base_url: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            ca_cert: None,
            poll: PollSettings::default(),
        }
    }

    pub fn endpoints(&self) -> Result<Endpoints, CoreError> {
        match &self.base_url {
            Some(url) => Ok(Endpoints::with_base(url.clone())),
            None => Ok(Endpoints::public()?),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = self
            .ca_cert
            .clone()
            .map_or(TlsMode::System, TlsMode::CustomCa);
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }

    /// Build the session client this configuration describes.
    pub fn build_client(&self) -> Result<GpsClient, CoreError> {
        if self.username.is_empty() {
            return Err(CoreError::Config {
                message: "username is required".into(),
            });
        }

        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        Ok(GpsClient::new(
            credentials,
            self.account_id.clone(),
            self.endpoints()?,
            &self.transport(),
        )?)
    }
}
