//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use trackline_config::ConfigError;
use trackline_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNAVAILABLE: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the portal at {url}")]
    #[diagnostic(
        code(trackline::connection_failed),
        help(
            "Check your network connection and that the portal is up.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(trackline::auth_failed),
        help(
            "Verify your portal username and password.\n\
             Run: trackline config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(trackline::no_credentials),
        help(
            "Configure credentials with: trackline config init\n\
             Or set TRACKLINE_USERNAME and TRACKLINE_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(trackline::not_found),
        help("Run: trackline {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Portal ───────────────────────────────────────────────────────
    #[error("The portal did not return a usable device list: {reason}")]
    #[diagnostic(
        code(trackline::refresh_failed),
        help("The session may have expired. Try again; a new login happens automatically.")
    )]
    RefreshFailed { reason: String },

    #[error("The portal session was lost: {reason}")]
    #[diagnostic(
        code(trackline::session_lost),
        help("Nothing was sent. Try again; a new login happens automatically.")
    )]
    SessionLost { reason: String },

    #[error("Command '{command}' was not accepted for device {device}")]
    #[diagnostic(code(trackline::command_rejected))]
    CommandRejected { command: String, device: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(trackline::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(trackline::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: trackline config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(trackline::no_config),
        help(
            "Create one with: trackline config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(trackline::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(trackline::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(trackline::timeout),
        help("Increase the timeout with --timeout, or try again later.")
    )]
    Timeout { seconds: u64 },

    #[error("{message}")]
    #[diagnostic(code(trackline::internal))]
    Internal { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON output: {0}")]
    #[diagnostic(code(trackline::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML output: {0}")]
    #[diagnostic(code(trackline::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::RefreshFailed { .. }
            | Self::SessionLost { .. }
            | Self::CommandRejected { .. } => exit_code::UNAVAILABLE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to auth failures.
    pub fn with_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.to_owned(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },

            CoreError::Timeout { timeout_secs } | CoreError::CycleTimeout { timeout_secs } => {
                CliError::Timeout {
                    seconds: timeout_secs,
                }
            }

            CoreError::RefreshFailed { reason } => CliError::RefreshFailed { reason },

            CoreError::SessionLost { reason } => CliError::SessionLost { reason },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::NotStarted => CliError::Internal {
                message: "portal session is closed".into(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let auth: CliError = CoreError::AuthenticationFailed {
            message: "bad password".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing: CliError = CoreError::DeviceNotFound {
            identifier: "Emma".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let cycle: CliError = CoreError::CycleTimeout { timeout_secs: 300 }.into();
        assert!(matches!(cycle, CliError::Timeout { seconds: 300 }));
        assert_eq!(cycle.exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn lost_session_is_unavailable() {
        let err: CliError = CoreError::SessionLost {
            reason: "device page answered HTTP 302".into(),
        }
        .into();
        assert!(matches!(err, CliError::SessionLost { .. }));
        assert_eq!(err.exit_code(), exit_code::UNAVAILABLE);
    }

    #[test]
    fn auth_failure_names_the_profile() {
        let err: CliError = CoreError::AuthenticationFailed {
            message: "rejected".into(),
        }
        .into();
        match err.with_profile("family") {
            CliError::AuthFailed { profile, message } => {
                assert_eq!(profile, "family");
                assert_eq!(message, "rejected");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_credentials_are_auth_errors() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "default".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
