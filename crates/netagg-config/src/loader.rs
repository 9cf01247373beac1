//! Settings loading: optional YAML file first, `NETAGG_*` environment second.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, DatacenterFilter, LogFormatKind};

/// Environment variable naming the settings file.
pub const CONFIG_PATH_ENV: &str = "NETAGG_CONFIG";

/// Load settings from the process environment.
///
/// The settings file defaults to `settings.yaml` in the working directory and
/// may be absent.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if a merged value
/// fails validation.
pub fn load() -> ConfigResult<AppConfig> {
    let lookup = |key: &str| std::env::var(key).ok();
    let path = lookup(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(defaults::CONFIG_FILE), PathBuf::from);
    let mut config = load_from_path(&path)?;
    apply_env_overrides(&mut config, lookup)?;
    config.validate()?;
    Ok(config)
}

/// Parse the settings file at `path`, falling back to defaults when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_from_path(path: &Path) -> ConfigResult<AppConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "settings file not found; using defaults");
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `NETAGG_*` overrides resolved through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when an override cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("NETAGG_INVENTORY_URL") {
        config.inventory.url = value;
    }
    if let Some(value) = lookup("NETAGG_INVENTORY_API_KEY") {
        config.inventory.api_key = value;
    }
    if let Some(value) = lookup("NETAGG_DATACENTER") {
        config.inventory.datacenter = value;
    }
    if let Some(value) = lookup("NETAGG_DATACENTER_FILTER") {
        config.inventory.datacenter_filter = DatacenterFilter::parse(&value)?;
    }
    if let Some(value) = lookup("NETAGG_BUILD_INTERVAL_SECS") {
        config.build.interval_secs = parse_u64("build.interval_secs", &value)?;
    }
    if let Some(value) = lookup("NETAGG_BUILD_ALL_DEVICES_MUST_BUILD") {
        config.build.all_devices_must_build =
            parse_bool("build.all_devices_must_build", &value)?;
    }
    if let Some(value) = lookup("NETAGG_BUILD_SOURCE_TIMEOUT_SECS") {
        config.build.source_timeout_secs = Some(parse_u64("build.source_timeout_secs", &value)?);
    }
    if let Some(value) = lookup("NETAGG_API_LISTEN_ADDRESS") {
        config.api.listen_address = value.trim().parse::<IpAddr>().map_err(|_| {
            ConfigError::invalid("api.listen_address", value.clone(), "must be an IP address")
        })?;
    }
    if let Some(value) = lookup("NETAGG_API_LISTEN_PORT") {
        config.api.listen_port = value.trim().parse::<u16>().map_err(|_| {
            ConfigError::invalid("api.listen_port", value.clone(), "must be between 1 and 65535")
        })?;
    }
    if let Some(value) = lookup("NETAGG_LOG_LEVEL") {
        config.log.level = value;
    }
    if let Some(value) = lookup("NETAGG_LOG_FORMAT") {
        config.log.format = LogFormatKind::parse(&value)?;
    }
    debug!("environment overrides applied");
    Ok(())
}

fn parse_u64(field: &'static str, value: &str) -> ConfigResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, value, "must be a non-negative integer"))
}

fn parse_bool(field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(field, value, "must be a boolean")),
    }
}
