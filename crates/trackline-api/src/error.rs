use thiserror::Error;

/// Top-level error type for the `trackline-api` crate.
///
/// Soft failures during a device-list fetch (expired session, unparseable
/// body) are NOT errors -- they are reported through
/// [`Refresh`](crate::Refresh). Everything here is something the caller
/// has to act on.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login page unreachable, credentials rejected, or no account redirect.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No fresh CSRF token before a form submit. The held token has been
    /// dropped and nothing was posted.
    #[error("No CSRF token available: {message}")]
    CsrfUnavailable { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The client was closed and its transport released.
    #[error("Client is closed")]
    Closed,
}

impl Error {
    pub(crate) fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Returns `true` if the portal rejected the credentials, as opposed to
    /// being unreachable or losing an existing session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
