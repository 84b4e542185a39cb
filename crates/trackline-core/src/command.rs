// ── Command API ──
//
// All device-side actions flow through a single `Command` enum. The
// coordinator routes each variant to the session client it owns.

use trackline_api::FunctionCode;

/// A device function or message, addressed by device uuid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the watch for an immediate GPS fix (`0039`).
    RefreshLocation { device_id: String },
    /// Switch the watch off (`0048`).
    PowerOff { device_id: String },
    /// Show a text message on the watch.
    SendMessage { device_id: String, message: String },
    /// Any other portal function code.
    Function {
        device_id: String,
        code: String,
        value: Option<String>,
        value_param: Option<String>,
    },
}

impl Command {
    pub fn device_id(&self) -> &str {
        match self {
            Self::RefreshLocation { device_id }
            | Self::PowerOff { device_id }
            | Self::SendMessage { device_id, .. }
            | Self::Function { device_id, .. } => device_id,
        }
    }

    /// Portal function code, or `None` for messages.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::RefreshLocation { .. } => Some(FunctionCode::REFRESH_LOCATION),
            Self::PowerOff { .. } => Some(FunctionCode::POWER_OFF),
            Self::SendMessage { .. } => None,
            Self::Function { code, .. } => Some(code),
        }
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RefreshLocation { .. } => "refresh-location",
            Self::PowerOff { .. } => "power-off",
            Self::SendMessage { .. } => "message",
            Self::Function { .. } => "function",
        }
    }

    /// Same command addressed to another device.
    pub(crate) fn with_device_id(mut self, id: String) -> Self {
        match &mut self {
            Self::RefreshLocation { device_id }
            | Self::PowerOff { device_id }
            | Self::SendMessage { device_id, .. }
            | Self::Function { device_id, .. } => *device_id = id,
        }
        self
    }
}

/// Result of a command execution.
///
/// `accepted` only means the HTTP exchange completed; the portal's own
/// verdict is logged, not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub device_id: String,
    pub accepted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_codes() {
        let locate = Command::RefreshLocation {
            device_id: "u-1".into(),
        };
        assert_eq!(locate.code(), Some("0039"));
        assert_eq!(
            Command::PowerOff {
                device_id: "u-1".into()
            }
            .code(),
            Some("0048")
        );
        assert_eq!(
            Command::SendMessage {
                device_id: "u-1".into(),
                message: "hi".into()
            }
            .code(),
            None
        );
    }

    #[test]
    fn readdressing_keeps_payload() {
        let cmd = Command::SendMessage {
            device_id: "Emma".into(),
            message: "dinner".into(),
        }
        .with_device_id("u-1".into());
        assert_eq!(
            cmd,
            Command::SendMessage {
                device_id: "u-1".into(),
                message: "dinner".into()
            }
        );
    }
}
