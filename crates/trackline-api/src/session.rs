// In-memory session state.
//
// Owned by exactly one `GpsClient`. Never persisted.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Cookie + CSRF pair plus the account the session belongs to.
///
/// Cookie and CSRF token are set and cleared together: a session with only
/// one of them counts as logged out.
#[derive(Default)]
pub struct Session {
    cookie: Option<SecretString>,
    csrf_token: Option<String>,
    account_id: String,
}

impl Session {
    pub(crate) fn new(account_id: impl Into<String>) -> Self {
        Self {
            cookie: None,
            csrf_token: None,
            account_id: account_id.into(),
        }
    }

    /// `true` when both a session cookie and a CSRF token are held.
    pub fn is_logged_in(&self) -> bool {
        self.cookie.is_some() && self.csrf_token.is_some()
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub(crate) fn cookie(&self) -> Option<&str> {
        self.cookie.as_ref().map(ExposeSecret::expose_secret)
    }

    /// Commit a successful login.
    pub(crate) fn establish(&mut self, cookie: String, csrf_token: String) {
        self.cookie = Some(SecretString::from(cookie));
        self.csrf_token = Some(csrf_token);
    }

    /// Replace the CSRF token after a page fetch. A miss drops the held
    /// token: it was already spent and is never posted twice.
    pub(crate) fn replace_csrf(&mut self, csrf_token: Option<String>) {
        self.csrf_token = csrf_token;
    }

    pub(crate) fn set_account_id(&mut self, account_id: String) {
        self.account_id = account_id;
    }

    /// Forget cookie and CSRF token. The account id survives: it is
    /// configuration, not a credential.
    pub(crate) fn clear(&mut self) {
        self.cookie = None;
        self.csrf_token = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[REDACTED]"))
            .field("account_id", &self.account_id)
            .finish()
    }
}
