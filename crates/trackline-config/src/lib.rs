//! Shared configuration for trackline.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `trackline_core::CoordinatorConfig`. The CLI adds
//! `GlobalOpts`-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use trackline_core::{CoordinatorConfig, PollSettings};

/// Service name under which passwords live in the system keyring.
pub const KEYRING_SERVICE: &str = "trackline";

/// Environment variable consulted for the password before the keyring.
pub const PASSWORD_ENV: &str = "TRACKLINE_PASSWORD";
/// Environment variable consulted when a profile has no username.
pub const USERNAME_ENV: &str = "TRACKLINE_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Per-request HTTP timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between scheduled polls.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    /// Upper bound for one update cycle (seconds).
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            update_interval: default_update_interval(),
            cycle_timeout: default_cycle_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_update_interval() -> u64 {
    30
}
fn default_cycle_timeout() -> u64 {
    300
}

/// A named portal account.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Portal login (usually an e-mail address).
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Expected account id. Discovered at login when absent.
    pub account_id: Option<String>,

    /// Portal origin override.
    pub base_url: Option<String>,

    /// Extra CA certificate (PEM) to trust.
    pub ca_cert: Option<PathBuf>,

    /// Override poll interval (seconds).
    pub update_interval: Option<u64>,

    /// Override cycle timeout (seconds).
    pub cycle_timeout: Option<u64>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "trackline", "trackline").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("trackline");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn base_figment() -> Figment {
    Figment::new().merge(Serialized::defaults(Config::default()))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from a specific file, then `TRACKLINE_*` env overrides.
///
/// Nested keys use a double underscore, e.g.
/// `TRACKLINE_DEFAULTS__UPDATE_INTERVAL=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = base_figment()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TRACKLINE_").split("__"));

    Ok(figment.extract()?)
}

/// Parse config from TOML text, without environment overrides.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    Ok(base_figment().merge(Toml::string(toml)).extract()?)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring_entry(profile_name).ok()?.get_password().ok()
}

/// Resolve the username: profile value, then `TRACKLINE_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    resolve_username_from(profile, profile_name, |name| std::env::var(name).ok())
}

fn resolve_username_from(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| env(USERNAME_ENV))
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password from the credential chain.
///
/// Order: the env var named by `password_env`, `TRACKLINE_PASSWORD`,
/// the system keyring, plaintext in the profile.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_from(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        keyring_password,
    )
}

fn resolve_password_from(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Global env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok(SecretString::from(pw));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse and validate a portal origin.
pub fn parse_base_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "base_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Poll timing from profile overrides, falling back to global defaults.
pub fn poll_settings(profile: &Profile, defaults: &Defaults) -> Result<PollSettings, ConfigError> {
    let cycle_timeout = profile.cycle_timeout.unwrap_or(defaults.cycle_timeout);
    if cycle_timeout == 0 {
        return Err(ConfigError::Validation {
            field: "cycle_timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    Ok(PollSettings {
        update_interval: Duration::from_secs(
            profile.update_interval.unwrap_or(defaults.update_interval),
        ),
        cycle_timeout: Duration::from_secs(cycle_timeout),
    })
}

/// Build a `CoordinatorConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;

    let mut cfg = CoordinatorConfig::new(username, password);
    apply_profile(&mut cfg, profile, defaults)?;
    Ok(cfg)
}

/// Copy everything except credentials from a profile onto `cfg`.
pub fn apply_profile(
    cfg: &mut CoordinatorConfig,
    profile: &Profile,
    defaults: &Defaults,
) -> Result<(), ConfigError> {
    cfg.account_id = profile.account_id.clone().unwrap_or_default();
    cfg.base_url = profile.base_url.as_deref().map(parse_base_url).transpose()?;
    cfg.ca_cert.clone_from(&profile.ca_cert);
    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    cfg.poll = poll_settings(profile, defaults)?;
    Ok(())
}
