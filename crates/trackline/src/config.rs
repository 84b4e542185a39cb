//! CLI configuration: thin wrapper around `trackline_config` shared types.
//!
//! Adds the resolution step that lets `GlobalOpts` flags (--username,
//! --account, --timeout, ...) override profile values.

use trackline_core::CoordinatorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use trackline_config::{
    Config, Profile, config_path, load_config, save_config, store_password,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Profile with every CLI flag override applied on top.
pub fn apply_overrides(profile: &Profile, global: &GlobalOpts) -> Profile {
    let mut merged = profile.clone();
    if let Some(ref username) = global.username {
        merged.username = Some(username.clone());
    }
    if let Some(ref account) = global.account {
        merged.account_id = Some(account.clone());
    }
    if let Some(ref base_url) = global.base_url {
        merged.base_url = Some(base_url.clone());
    }
    if let Some(ref ca_cert) = global.ca_cert {
        merged.ca_cert = Some(ca_cert.clone());
    }
    if let Some(timeout) = global.timeout {
        merged.timeout = Some(timeout);
    }
    merged
}

/// Build a `CoordinatorConfig` from the config file, the active profile,
/// and CLI overrides. Returns the profile name alongside it.
///
/// Without a matching profile, flags and `TRACKLINE_*` variables alone
/// are enough as long as a username is supplied.
pub fn coordinator_config(global: &GlobalOpts) -> Result<(String, CoordinatorConfig), CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let base = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.username.is_some() => Profile::default(),
        None if cfg.profiles.is_empty() => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
        None => {
            let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: names.join(", "),
            });
        }
    };

    let profile = apply_overrides(&base, global);
    let coordinator =
        trackline_config::profile_to_coordinator_config(&profile, &profile_name, &cfg.defaults)?;
    Ok((profile_name, coordinator))
}
