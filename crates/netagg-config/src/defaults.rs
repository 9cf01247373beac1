//! Baseline values applied when neither the settings file nor the environment
//! provide a field.

use std::net::{IpAddr, Ipv4Addr};

/// Seconds between two scheduled builds.
pub const BUILD_INTERVAL_SECS: u64 = 60;
/// Address the read API binds to.
pub const LISTEN_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
/// Port the read API binds to.
pub const LISTEN_PORT: u16 = 8080;
/// Log level used when `RUST_LOG` is unset.
pub const LOG_LEVEL: &str = "info";
/// Settings file looked up in the working directory.
pub const CONFIG_FILE: &str = "settings.yaml";
