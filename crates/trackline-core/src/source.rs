// ── Device source seam ──
//
// The coordinator drives anything that can log in, produce a device list,
// and forward commands. `GpsClient` is the production implementation.

use std::future::Future;

use trackline_api::{Error, GpsClient, Refresh};

/// An exclusively-owned producer of device snapshots.
///
/// Every method takes `&mut self`: implementations carry session state
/// that each call depends on, so calls never overlap.
pub trait DeviceSource: Send + 'static {
    /// Log in and resolve the account id.
    fn install(&mut self) -> impl Future<Output = Result<String, Error>> + Send;

    /// One polling cycle.
    fn update(&mut self) -> impl Future<Output = Result<Refresh, Error>> + Send;

    /// Invoke a device function.
    fn send_command(
        &mut self,
        device_id: &str,
        code: &str,
        value: Option<&str>,
        value_param: Option<&str>,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Post a text message to a device.
    fn send_message(
        &mut self,
        device_id: &str,
        message: &str,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Release resources. Idempotent.
    fn close(&mut self);
}

impl DeviceSource for GpsClient {
    fn install(&mut self) -> impl Future<Output = Result<String, Error>> + Send {
        GpsClient::install(self)
    }

    fn update(&mut self) -> impl Future<Output = Result<Refresh, Error>> + Send {
        GpsClient::update(self)
    }

    fn send_command(
        &mut self,
        device_id: &str,
        code: &str,
        value: Option<&str>,
        value_param: Option<&str>,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        GpsClient::send_command(self, device_id, code, value, value_param)
    }

    fn send_message(
        &mut self,
        device_id: &str,
        message: &str,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        GpsClient::send_message(self, device_id, message)
    }

    fn close(&mut self) {
        GpsClient::close(self);
    }
}
