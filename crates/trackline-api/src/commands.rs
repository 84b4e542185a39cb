// Device command endpoints
//
// Every command re-reads the CSRF token first (no re-login) and then posts
// a form. Without a fresh token nothing is posted. The portal's answer is
// logged but not interpreted: a completed HTTP exchange counts as success.

use tracing::{debug, warn};

use crate::client::{GpsClient, preview};
use crate::error::Error;
use crate::models::FunctionCode;

/// Form field used for a command value when no explicit field is given.
const DEFAULT_VALUE_FIELD: &str = "function[cmd_value][]";

impl GpsClient {
    /// Invoke a device function, e.g. `"0039"` (locate) or `"0048"` (power off).
    ///
    /// `value` is posted under `value_param` when given, otherwise under
    /// `function[cmd_value][]`. An empty `value` is treated as absent.
    pub async fn send_command(
        &mut self,
        device_id: &str,
        code: &str,
        value: Option<&str>,
        value_param: Option<&str>,
    ) -> Result<bool, Error> {
        self.warn_if_logged_out("send_command");
        let csrf = self.refresh_csrf().await?;
        let mut form = vec![("function[code]", code), ("authenticity_token", csrf.as_str())];
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            form.push((value_param.unwrap_or(DEFAULT_VALUE_FIELD), value));
        }

        let url = self.endpoints().function_url(device_id)?;
        debug!(device_id, code, "POST {}", url);

        let resp = self.post_form(url, self.session_cookie(), &form).await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(
            status = status.as_u16(),
            body = preview(&body),
            "send_command response"
        );

        Ok(true)
    }

    /// Post a free-text message to the watch's display.
    pub async fn send_message(&mut self, device_id: &str, message: &str) -> Result<bool, Error> {
        self.warn_if_logged_out("send_message");
        let csrf = self.refresh_csrf().await?;
        let form = [
            ("device_message[message]", message),
            ("authenticity_token", csrf.as_str()),
        ];

        let url = self.endpoints().message_url(device_id)?;
        debug!(device_id, "POST {}", url);

        let resp = self.post_form(url, self.session_cookie(), &form).await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(
            status = status.as_u16(),
            body = preview(&body),
            "send_message response"
        );

        Ok(true)
    }

    /// Ask the watch for an immediate GPS fix.
    pub async fn force_locate(&mut self, device_id: &str) -> Result<bool, Error> {
        self.send_command(device_id, FunctionCode::REFRESH_LOCATION, None, None)
            .await
    }

    /// Switch the watch off.
    pub async fn power_off(&mut self, device_id: &str) -> Result<bool, Error> {
        self.send_command(device_id, FunctionCode::POWER_OFF, None, None)
            .await
    }

    fn warn_if_logged_out(&self, operation: &str) {
        if !self.is_logged_in() {
            warn!(operation, "no active session, the portal will likely reject this");
        }
    }
}
