// Portal URL layout.
//
// Every endpoint hangs off one origin. The production origin is the
// default; tests and self-hosted mirrors point `with_base` elsewhere.

use url::Url;

use crate::error::Error;

/// The public One2Track portal.
pub const DEFAULT_BASE_URL: &str = "https://www.one2trackgps.com/";

/// Name of the session cookie issued after a successful login.
pub const DEFAULT_SESSION_COOKIE: &str = "_iadmin";

/// URL layout of the portal and the name of its session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: Url,
    session_cookie: String,
}

impl Endpoints {
    /// Endpoints of the public portal.
    pub fn public() -> Result<Self, Error> {
        Ok(Self::with_base(Url::parse(DEFAULT_BASE_URL)?))
    }

    /// Derive all endpoints from another origin.
    ///
    /// A missing trailing slash is added so relative joins keep the full
    /// base path (`https://host/mirror` → `https://host/mirror/users/...`).
    pub fn with_base(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            session_cookie: DEFAULT_SESSION_COOKIE.into(),
        }
    }

    /// The portal root. Requesting it while logged in redirects to the
    /// account's device page, which is how the account id is discovered.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    /// `{base}/auth/users/sign_in`
    pub fn login_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join("auth/users/sign_in")?)
    }

    /// `{base}/users/{account}/devices`
    pub fn devices_url(&self, account_id: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("users/{account_id}/devices"))?)
    }

    /// `{base}/api/devices/{uuid}/functions`
    pub fn function_url(&self, device_id: &str) -> Result<Url, Error> {
        Ok(self
            .base_url
            .join(&format!("api/devices/{device_id}/functions"))?)
    }

    /// `{base}/devices/{uuid}/messages`
    pub fn message_url(&self, device_id: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("devices/{device_id}/messages"))?)
    }
}
