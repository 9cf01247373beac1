#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Typed settings for the aggregation service.
//!
//! Layout: `model.rs` (settings structs and the source policy table),
//! `loader.rs` (YAML file + environment overrides), `defaults.rs` (baseline values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, apply_env_overrides, load, load_from_path};
pub use model::{
    ApiConfig, AppConfig, BuildConfig, Criticality, DatacenterFilter, InventoryConfig, LogConfig,
    LogFormatKind, SourceCategory, SourcePolicy, SourceRule, SourceRuleOverride,
};
