use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use relay_control::ControllerSettings;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const SETTINGS_FILE_NAME: &str = "relay_operator.toml";
pub const DEFAULT_RELAY_IMAGE: &str = "scsibug/nostr-rs-relay:latest";
pub const DEFAULT_CONTAINER_NAME: &str = "privacy-lion-relay";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub relay_image: String,
    pub container_name: String,
    pub data_dir: PathBuf,
    pub probe_timeout_secs: u64,
    pub docker_program: String,
    pub binary_candidates: Vec<String>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            relay_image: DEFAULT_RELAY_IMAGE.into(),
            container_name: DEFAULT_CONTAINER_NAME.into(),
            data_dir: env::temp_dir().join(DEFAULT_CONTAINER_NAME),
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            docker_program: "docker".into(),
            binary_candidates: vec![
                "./target/release/nostr-rs-relay".into(),
                "./nostr-rs-relay/target/release/nostr-rs-relay".into(),
                "/usr/local/bin/nostr-rs-relay".into(),
                "nostr-rs-relay".into(),
            ],
        }
    }
}

impl HostSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorSettings {
    pub controller: ControllerSettings,
    pub host: HostSettings,
}

/// Defaults, then the first settings file found, then `APP__*` environment overrides.
pub fn load_settings() -> OperatorSettings {
    load_settings_from(settings_path().as_deref())
}

pub fn load_settings_from(path: Option<&Path>) -> OperatorSettings {
    let mut settings = match path {
        Some(path) => match read_settings_file(path) {
            Ok(settings) => {
                info!(path = %path.display(), "loaded relay operator settings");
                settings
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "ignoring unreadable settings file");
                OperatorSettings::default()
            }
        },
        None => OperatorSettings::default(),
    };

    apply_env_overrides(&mut settings, |key| env::var(key).ok());
    settings
}

pub fn settings_path() -> Option<PathBuf> {
    let local = PathBuf::from(SETTINGS_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("relay_operator").join(SETTINGS_FILE_NAME))
        .filter(|path| path.is_file())
}

pub fn read_settings_file(path: &Path) -> anyhow::Result<OperatorSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    parse_settings(&raw).with_context(|| format!("invalid settings file '{}'", path.display()))
}

pub fn parse_settings(raw: &str) -> anyhow::Result<OperatorSettings> {
    Ok(toml::from_str(raw)?)
}

pub fn apply_env_overrides<F>(settings: &mut OperatorSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parsed(&lookup, "RELAY_PORT") {
        settings.controller.relay_port = v;
    }
    if let Some(v) = parsed(&lookup, "APP__RELAY_PORT") {
        settings.controller.relay_port = v;
    }
    if let Some(v) = parsed(&lookup, "APP__HEALTH_INTERVAL_SECS") {
        settings.controller.health_interval_secs = v;
    }
    if let Some(v) = parsed(&lookup, "APP__TELEMETRY_INTERVAL_MS") {
        settings.controller.telemetry_interval_ms = v;
    }
    if let Some(v) = parsed(&lookup, "APP__LOG_CAPACITY") {
        settings.controller.log_capacity = v;
    }

    if let Some(v) = lookup("APP__RELAY_IMAGE") {
        settings.host.relay_image = v;
    }
    if let Some(v) = lookup("APP__RELAY_CONTAINER") {
        settings.host.container_name = v;
    }
    if let Some(v) = lookup("APP__RELAY_DATA_DIR") {
        settings.host.data_dir = PathBuf::from(v);
    }
    if let Some(v) = parsed(&lookup, "APP__PROBE_TIMEOUT_SECS") {
        settings.host.probe_timeout_secs = v;
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid setting override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
