// ── Core error types ──
//
// User-facing errors from trackline-core. Consumers never see raw HTTP
// failures; the `From<trackline_api::Error>` impl translates them into
// domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach portal at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Update cycle exceeded {timeout_secs}s and was abandoned")]
    CycleTimeout { timeout_secs: u64 },

    /// The portal answered, but not with a usable device list.
    #[error("Refresh failed: {reason}")]
    RefreshFailed { reason: String },

    /// The portal dropped the session between cycles. The next attempt
    /// logs in again.
    #[error("Portal session lost: {reason}")]
    SessionLost { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator is not running")]
    NotStarted,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether retrying the whole setup later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::CycleTimeout { .. }
                | Self::RefreshFailed { .. }
                | Self::SessionLost { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<trackline_api::Error> for CoreError {
    fn from(err: trackline_api::Error) -> Self {
        match err {
            trackline_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            trackline_api::Error::CsrfUnavailable { message } => {
                CoreError::SessionLost { reason: message }
            }
            trackline_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            trackline_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            trackline_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            trackline_api::Error::Closed => CoreError::NotStarted,
        }
    }
}
