//! Typed settings and the per-source build policy table.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Root settings document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Inventory (CMDB) connection settings.
    pub inventory: InventoryConfig,
    /// Build pipeline and scheduler settings.
    pub build: BuildConfig,
    /// Read API listener settings.
    pub api: ApiConfig,
    /// Logging settings.
    pub log: LogConfig,
}

impl AppConfig {
    /// Check cross-field invariants after file and environment layers were merged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first field that fails validation.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.build.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "build.interval_secs",
                "0",
                "must be positive",
            ));
        }
        if self.build.source_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "build.source_timeout_secs",
                "0",
                "must be positive",
            ));
        }
        if self.api.listen_port == 0 {
            return Err(ConfigError::invalid(
                "api.listen_port",
                "0",
                "must be between 1 and 65535",
            ));
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "log.level",
                value: None,
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Connection settings for the inventory API.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InventoryConfig {
    /// Base URL of the inventory API.
    pub url: String,
    /// Token sent in the `Authorization` header.
    pub api_key: String,
    /// Datacenter the service aggregates; empty means no filter.
    pub datacenter: String,
    /// Which location level `datacenter` refers to.
    pub datacenter_filter: DatacenterFilter,
}

/// Location level used to scope inventory queries.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatacenterFilter {
    /// Filter on the site name.
    #[default]
    Site,
    /// Filter on the site group name.
    SiteGroup,
    /// Filter on the region name.
    Region,
}

impl DatacenterFilter {
    /// Parse the configuration spelling of the filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for unknown spellings.
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim() {
            "site" => Ok(Self::Site),
            "site_group" => Ok(Self::SiteGroup),
            "region" => Ok(Self::Region),
            other => Err(ConfigError::invalid(
                "inventory.datacenter_filter",
                other,
                "must be one of site, site_group, region",
            )),
        }
    }

    /// Query key used by the device inventory endpoint.
    #[must_use]
    pub const fn device_key(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::SiteGroup => "site_group",
            Self::Region => "region",
        }
    }

    /// Query key used by endpoints whose records hang off a device.
    #[must_use]
    pub const fn related_device_key(self) -> &'static str {
        match self {
            Self::Site => "device__site__name",
            Self::SiteGroup => "device__site__group__name",
            Self::Region => "device__site__region__name",
        }
    }
}

/// Build pipeline and scheduler settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Seconds between two scheduled builds.
    pub interval_secs: u64,
    /// Abort the whole build when any inventory device lacks required data.
    pub all_devices_must_build: bool,
    /// Optional upper bound for a single source fetch.
    pub source_timeout_secs: Option<u64>,
    /// Per-category overrides of the default source policy.
    pub sources: BTreeMap<SourceCategory, SourceRuleOverride>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::BUILD_INTERVAL_SECS,
            all_devices_must_build: false,
            source_timeout_secs: None,
            sources: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Interval between two scheduled builds.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Upper bound applied to each source fetch, if configured.
    #[must_use]
    pub fn source_timeout(&self) -> Option<Duration> {
        self.source_timeout_secs.map(Duration::from_secs)
    }

    /// Default policy table with the configured overrides applied.
    #[must_use]
    pub fn source_policy(&self) -> SourcePolicy {
        let mut policy = SourcePolicy::default();
        for (category, rule) in &self.sources {
            policy.apply(*category, rule);
        }
        policy
    }
}

/// Read API listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Address to bind.
    pub listen_address: IpAddr,
    /// Port to bind.
    pub listen_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: defaults::LISTEN_ADDRESS,
            listen_port: defaults::LISTEN_PORT,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormatKind,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: LogFormatKind::Json,
        }
    }
}

/// Log output format selected in configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatKind {
    /// Structured JSON lines.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogFormatKind {
    /// Parse the configuration spelling of the format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for unknown spellings.
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ConfigError::invalid(
                "log.format",
                other,
                "must be one of json, pretty",
            )),
        }
    }
}

/// Inventory data categories fetched by one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// Network device inventory; defines which devices exist.
    Devices,
    /// Per-device BGP global configuration.
    BgpGlobal,
    /// BGP sessions, each shared by two devices.
    BgpSessions,
    /// BGP peer groups.
    PeerGroups,
    /// Route policies.
    RoutePolicies,
    /// Prefix lists.
    PrefixLists,
    /// BGP community lists.
    CommunityLists,
    /// SNMP configuration.
    Snmp,
}

impl SourceCategory {
    /// Every category, in fetch order.
    pub const ALL: [Self; 8] = [
        Self::Devices,
        Self::BgpGlobal,
        Self::BgpSessions,
        Self::PeerGroups,
        Self::RoutePolicies,
        Self::PrefixLists,
        Self::CommunityLists,
        Self::Snmp,
    ];

    /// Stable machine-friendly name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Devices => "devices",
            Self::BgpGlobal => "bgp_global",
            Self::BgpSessions => "bgp_sessions",
            Self::PeerGroups => "peer_groups",
            Self::RoutePolicies => "route_policies",
            Self::PrefixLists => "prefix_lists",
            Self::CommunityLists => "community_lists",
            Self::Snmp => "snmp",
        }
    }

    /// Human-readable label used in report messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Devices => "devices",
            Self::BgpGlobal => "BGP global configuration",
            Self::BgpSessions => "BGP sessions",
            Self::PeerGroups => "peer-groups",
            Self::RoutePolicies => "route-policies",
            Self::PrefixLists => "prefix-lists",
            Self::CommunityLists => "community-lists",
            Self::Snmp => "SNMP configuration",
        }
    }
}

impl Display for SourceCategory {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How a failed fetch of a category affects the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts the build and keeps the previous snapshot.
    Critical,
    /// Failure is reported as a warning and the build continues.
    BestEffort,
}

/// Effective policy for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRule {
    /// Fetch failure handling.
    pub criticality: Criticality,
    /// Devices without data for this category cannot be compiled.
    pub required: bool,
}

/// Partial rule read from the settings file.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SourceRuleOverride {
    /// Replacement criticality.
    pub criticality: Option<Criticality>,
    /// Replacement required flag.
    pub required: Option<bool>,
}

/// Load-bearing versus best-effort table for every source category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePolicy {
    rules: BTreeMap<SourceCategory, SourceRule>,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        let rules = SourceCategory::ALL
            .into_iter()
            .map(|category| (category, Self::default_rule(category)))
            .collect();
        Self { rules }
    }
}

impl SourcePolicy {
    const fn default_rule(category: SourceCategory) -> SourceRule {
        match category {
            SourceCategory::Devices => SourceRule {
                criticality: Criticality::Critical,
                required: false,
            },
            SourceCategory::BgpSessions
            | SourceCategory::RoutePolicies
            | SourceCategory::PrefixLists
            | SourceCategory::CommunityLists => SourceRule {
                criticality: Criticality::Critical,
                required: true,
            },
            SourceCategory::PeerGroups => SourceRule {
                criticality: Criticality::BestEffort,
                required: true,
            },
            SourceCategory::BgpGlobal | SourceCategory::Snmp => SourceRule {
                criticality: Criticality::BestEffort,
                required: false,
            },
        }
    }

    /// Effective rule for `category`.
    #[must_use]
    pub fn rule(&self, category: SourceCategory) -> SourceRule {
        self.rules
            .get(&category)
            .copied()
            .unwrap_or_else(|| Self::default_rule(category))
    }

    /// Whether a fetch failure of `category` aborts the build.
    #[must_use]
    pub fn is_load_bearing(&self, category: SourceCategory) -> bool {
        self.rule(category).criticality == Criticality::Critical
    }

    /// Whether every device needs data from `category` to be compiled.
    ///
    /// The device inventory itself is never a per-device requirement.
    #[must_use]
    pub fn is_required(&self, category: SourceCategory) -> bool {
        category != SourceCategory::Devices && self.rule(category).required
    }

    /// Replace parts of a rule.
    pub fn apply(&mut self, category: SourceCategory, rule: &SourceRuleOverride) {
        let mut effective = self.rule(category);
        if let Some(criticality) = rule.criticality {
            effective.criticality = criticality;
        }
        if let Some(required) = rule.required {
            effective.required = required;
        }
        self.rules.insert(category, effective);
    }

    /// Builder-style variant of [`SourcePolicy::apply`].
    #[must_use]
    pub fn with_rule(mut self, category: SourceCategory, rule: SourceRule) -> Self {
        self.rules.insert(category, rule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_source_table() {
        let policy = SourcePolicy::default();
        for category in [
            SourceCategory::Devices,
            SourceCategory::BgpSessions,
            SourceCategory::RoutePolicies,
            SourceCategory::PrefixLists,
            SourceCategory::CommunityLists,
        ] {
            assert!(policy.is_load_bearing(category), "{category} should abort");
        }
        for category in [
            SourceCategory::BgpGlobal,
            SourceCategory::PeerGroups,
            SourceCategory::Snmp,
        ] {
            assert!(!policy.is_load_bearing(category), "{category} is best effort");
        }
        assert!(policy.is_required(SourceCategory::PeerGroups));
        assert!(!policy.is_required(SourceCategory::BgpGlobal));
        assert!(!policy.is_required(SourceCategory::Devices));
    }

    #[test]
    fn overrides_only_touch_provided_fields() {
        let mut build = BuildConfig::default();
        build.sources.insert(
            SourceCategory::Snmp,
            SourceRuleOverride {
                criticality: Some(Criticality::Critical),
                required: None,
            },
        );
        let policy = build.source_policy();
        let rule = policy.rule(SourceCategory::Snmp);
        assert_eq!(rule.criticality, Criticality::Critical);
        assert!(!rule.required);
    }

    #[test]
    fn devices_are_never_required_per_device() {
        let policy = SourcePolicy::default().with_rule(
            SourceCategory::Devices,
            SourceRule {
                criticality: Criticality::Critical,
                required: true,
            },
        );
        assert!(!policy.is_required(SourceCategory::Devices));
    }

    #[test]
    fn validate_rejects_zero_interval_and_port() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.build.interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "build.interval_secs",
                ..
            })
        ));

        config.build.interval_secs = 30;
        config.api.listen_port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "api.listen_port",
                ..
            })
        ));
    }

    #[test]
    fn datacenter_filter_keys() {
        assert_eq!(
            DatacenterFilter::parse("site_group").map(DatacenterFilter::related_device_key).ok(),
            Some("device__site__group__name")
        );
        assert!(DatacenterFilter::parse("country").is_err());
        assert_eq!(DatacenterFilter::Region.device_key(), "region");
    }
}
