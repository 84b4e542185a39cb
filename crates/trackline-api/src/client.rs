// Portal session client
//
// Wraps `reqwest::Client` with the portal's browser-style session:
// scrape a CSRF token from a rendered page, submit credentials, capture
// the session cookie from the 302, and attach it by hand on every request.
// Device commands live in `commands.rs`.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::endpoints::Endpoints;
use crate::error::Error;
use crate::models::{DeviceWrapper, TrackerDevice};
use crate::scrape;
use crate::session::Session;
use crate::transport::TransportConfig;

/// Fixed consent cookie the portal expects on every request.
const CONSENT_COOKIE: &str = "accepted_cookies=true";

/// Username + password for the portal account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Outcome of one [`GpsClient::update`] cycle.
///
/// Only transport failures and login rejections are `Err`. A lost session
/// or an unreadable body is a soft failure the next cycle recovers from.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    /// Fresh device list, in portal order.
    Devices(Vec<TrackerDevice>),
    /// The portal refused the session. It has been cleared; the next
    /// cycle logs in again.
    SessionExpired { status: u16 },
    /// HTTP 200 but the body was not a device list.
    Malformed { message: String },
}

impl Refresh {
    /// The devices of a successful cycle; empty for soft failures.
    pub fn into_devices(self) -> Vec<TrackerDevice> {
        match self {
            Self::Devices(devices) => devices,
            Self::SessionExpired { .. } | Self::Malformed { .. } => Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Devices(_))
    }
}

/// What the login page hands out before credentials are submitted.
struct PreAuth {
    csrf: Option<String>,
    cookie: Option<String>,
}

/// Authenticated client for one portal account.
///
/// Owns its [`Session`] exclusively. All operations are sequential: each
/// request depends on cookie/CSRF state left behind by the previous one,
/// hence `&mut self` throughout.
pub struct GpsClient {
    http: Option<reqwest::Client>,
    endpoints: Endpoints,
    credentials: Credentials,
    session: Session,
}

impl GpsClient {
    /// Create a client with its own HTTP transport.
    ///
    /// `account_id` may be empty; it is discovered during login.
    pub fn new(
        credentials: Credentials,
        account_id: impl Into<String>,
        endpoints: Endpoints,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, credentials, account_id, endpoints))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// The client must not follow redirects and must not keep a cookie
    /// store, or login detection breaks.
    pub fn with_client(
        http: reqwest::Client,
        credentials: Credentials,
        account_id: impl Into<String>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            http: Some(http),
            endpoints,
            credentials,
            session: Session::new(account_id),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Read-only view of the session (secrets redacted in `Debug`).
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn account_id(&self) -> &str {
        self.session.account_id()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn is_closed(&self) -> bool {
        self.http.is_none()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Full bootstrap: login, then discover the account id.
    ///
    /// Leaves the session empty on any failure.
    pub async fn install(&mut self) -> Result<String, Error> {
        self.login().await?;
        match self.discover_account_id().await {
            Ok(account_id) => Ok(account_id),
            Err(e) => {
                self.session.clear();
                Err(e)
            }
        }
    }

    /// Harvest CSRF + pre-auth cookie, then submit credentials.
    ///
    /// Success requires a 302 carrying a fresh session cookie. Nothing is
    /// written to the session until that is seen.
    pub async fn login(&mut self) -> Result<(), Error> {
        let pre = self.fetch_login_page().await?;
        let csrf = pre.csrf.unwrap_or_default();

        let url = self.endpoints.login_url()?;
        let form = [
            ("authenticity_token", csrf.as_str()),
            ("user[login]", self.credentials.username.as_str()),
            ("user[password]", self.credentials.password.expose_secret()),
            ("gdpr", "1"),
            ("user[remember_me]", "1"),
        ];
        debug!("submitting credentials to {}", url);

        let resp = self.post_form(url, pre.cookie.as_deref(), &form).await?;
        let status = resp.status();
        debug!(status = status.as_u16(), "login response");

        let cookie = if status == StatusCode::FOUND {
            scrape::parse_session_cookie(resp.headers(), self.endpoints.session_cookie())
        } else {
            None
        };

        if let Some(cookie) = cookie {
            self.session.establish(cookie, csrf);
            info!("login successful");
            Ok(())
        } else {
            warn!(status = status.as_u16(), "login rejected");
            self.session.clear();
            Err(Error::auth("Invalid username or password"))
        }
    }

    /// Release the HTTP transport and forget the session.
    ///
    /// Idempotent; safe on a client that never logged in.
    pub fn close(&mut self) {
        if self.http.take().is_some() {
            debug!("session client closed");
        }
        self.session.clear();
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// One polling cycle: make sure a session exists, then fetch devices.
    ///
    /// An existing cookie is reused as-is; only a cleared session triggers
    /// the full login sequence.
    pub async fn update(&mut self) -> Result<Refresh, Error> {
        if self.session.is_logged_in() {
            debug!("reusing existing session");
        } else {
            debug!("no session, logging in");
            self.install().await?;
        }

        self.fetch_devices().await
    }

    /// Fetch and decode the device list with the current session.
    pub async fn fetch_devices(&mut self) -> Result<Refresh, Error> {
        if self.session.account_id().is_empty() {
            self.discover_account_id().await?;
        }

        let url = self.endpoints.devices_url(self.session.account_id())?;
        debug!("GET {}", url);

        let http = self.http()?;
        let resp = http
            .get(url)
            .header(COOKIE, self.cookie_header(self.session.cookie()))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            warn!(
                status = status.as_u16(),
                body = preview(&body),
                "device list rejected, clearing session"
            );
            self.session.clear();
            return Ok(Refresh::SessionExpired {
                status: status.as_u16(),
            });
        }

        if scrape::looks_like_html(&headers, &body) {
            warn!("device list answered with a rendered page, clearing session");
            self.session.clear();
            return Ok(Refresh::SessionExpired {
                status: status.as_u16(),
            });
        }

        match serde_json::from_str::<Vec<DeviceWrapper>>(&body) {
            Ok(wrappers) => {
                let devices: Vec<TrackerDevice> = wrappers.into_iter().map(|w| w.device).collect();
                debug!(count = devices.len(), "device list fetched");
                Ok(Refresh::Devices(devices))
            }
            Err(e) => {
                error!(error = %e, body = preview(&body), "cannot parse device list");
                Ok(Refresh::Malformed {
                    message: e.to_string(),
                })
            }
        }
    }

    // ── Session plumbing ─────────────────────────────────────────────

    async fn fetch_login_page(&self) -> Result<PreAuth, Error> {
        let url = self.endpoints.login_url()?;
        debug!("GET {}", url);

        let resp = self.get(url, None).await?;
        let status = resp.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "login page unavailable");
            return Err(Error::auth(format!(
                "Login page unavailable (HTTP {status})"
            )));
        }

        let cookie = scrape::parse_session_cookie(resp.headers(), self.endpoints.session_cookie());
        if cookie.is_none() {
            debug!("login page set no pre-auth cookie");
        }

        let html = resp.text().await?;
        let csrf = scrape::parse_csrf(&html);
        if csrf.is_none() {
            warn!("no CSRF token on login page");
        }

        Ok(PreAuth { csrf, cookie })
    }

    /// Request the portal root and read the account id off the redirect.
    async fn discover_account_id(&mut self) -> Result<String, Error> {
        let url = self.endpoints.base_url().clone();
        debug!("GET {} (account discovery)", url);

        let resp = self.get(url, self.session.cookie()).await?;
        let account_id = scrape::parse_account_redirect(resp.headers(), self.endpoints.base_url())
            .ok_or_else(|| {
                Error::auth(format!(
                    "no account redirect from portal root (HTTP {})",
                    resp.status()
                ))
            })?;

        let configured = self.session.account_id();
        if !configured.is_empty() && configured != account_id {
            warn!(
                configured,
                discovered = %account_id,
                "portal account differs from configured account, using portal's"
            );
        }
        debug!(account_id = %account_id, "account discovered");
        self.session.set_account_id(account_id.clone());
        Ok(account_id)
    }

    /// Read a fresh CSRF token from an authenticated page without logging
    /// in again. Tokens are single-use in practice, so every mutating call
    /// goes through here first. A miss leaves no token behind.
    pub(crate) async fn refresh_csrf(&mut self) -> Result<String, Error> {
        let url = self.endpoints.devices_url(self.session.account_id())?;
        debug!("GET {} (csrf refresh)", url);

        let resp = self.get(url, self.session.cookie()).await?;
        let status = resp.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "failed to retrieve csrf, clearing session");
            self.session.clear();
            return Err(Error::CsrfUnavailable {
                message: format!("device page answered HTTP {status}"),
            });
        }

        let html = resp.text().await?;
        let csrf = scrape::parse_csrf(&html);
        self.session.replace_csrf(csrf.clone());
        csrf.ok_or_else(|| {
            warn!("no CSRF token on device page");
            Error::CsrfUnavailable {
                message: "device page carried no token".into(),
            }
        })
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn http(&self) -> Result<&reqwest::Client, Error> {
        self.http.as_ref().ok_or(Error::Closed)
    }

    /// `accepted_cookies=true` plus the session cookie when one is given.
    fn cookie_header(&self, session_cookie: Option<&str>) -> String {
        match session_cookie {
            Some(value) => format!(
                "{CONSENT_COOKIE}; {}={value}",
                self.endpoints.session_cookie()
            ),
            None => CONSENT_COOKIE.to_owned(),
        }
    }

    async fn get(&self, url: Url, cookie: Option<&str>) -> Result<reqwest::Response, Error> {
        Ok(self
            .http()?
            .get(url)
            .header(COOKIE, self.cookie_header(cookie))
            .send()
            .await?)
    }

    pub(crate) async fn post_form(
        &self,
        url: Url,
        cookie: Option<&str>,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, Error> {
        Ok(self
            .http()?
            .post(url)
            .header(COOKIE, self.cookie_header(cookie))
            .form(form)
            .send()
            .await?)
    }

    pub(crate) fn session_cookie(&self) -> Option<&str> {
        self.session.cookie()
    }
}

/// First 200 bytes of a body, for logs.
pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
