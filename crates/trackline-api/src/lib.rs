// trackline-api: async session client for the One2Track GPS-watch portal
//
// The portal has no official API. This crate drives it like a browser:
// CSRF token scraped from rendered pages, session cookie captured from the
// login redirect, JSON device list fetched with that cookie.

pub mod client;
pub mod commands;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod scrape;
pub mod session;
pub mod transport;

pub use client::{Credentials, GpsClient, Refresh};
pub use endpoints::Endpoints;
pub use error::Error;
pub use models::{FunctionCode, LastLocation, SimCard, TrackerDevice};
pub use session::Session;
pub use transport::{TlsMode, TransportConfig};
