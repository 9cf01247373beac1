//! Fetching seam between the pipeline and the inventory.

use async_trait::async_trait;
use netagg_config::SourceCategory;
use thiserror::Error;

use crate::model::{
    BgpGlobal, BgpSession, CommunityList, NetworkDevice, PeerGroup, PrefixList, RoutePolicy,
    SnmpConfig,
};

/// Errors raised while fetching one category. No partial results are kept.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request URL could not be assembled.
    #[error("invalid inventory URL")]
    Url {
        /// Category being fetched.
        category: SourceCategory,
        /// Offending URL text.
        url: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP request failed.
    #[error("inventory request failed")]
    Request {
        /// Category being fetched.
        category: SourceCategory,
        /// Request URL.
        url: String,
        /// Client error.
        #[source]
        source: reqwest::Error,
    },
    /// The inventory answered with a non-success status.
    #[error("inventory returned an error status")]
    Status {
        /// Category being fetched.
        category: SourceCategory,
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The response body did not match the expected records.
    #[error("failed to decode inventory response")]
    Decode {
        /// Category being fetched.
        category: SourceCategory,
        /// Request URL.
        url: String,
        /// Decoding error.
        #[source]
        source: reqwest::Error,
    },
    /// The source could not serve the category for another reason.
    #[error("inventory source unavailable")]
    Unavailable {
        /// Category being fetched.
        category: SourceCategory,
        /// Human-readable reason.
        reason: String,
    },
}

impl SourceError {
    /// Category whose fetch failed.
    #[must_use]
    pub const fn category(&self) -> SourceCategory {
        match self {
            Self::Url { category, .. }
            | Self::Request { category, .. }
            | Self::Status { category, .. }
            | Self::Decode { category, .. }
            | Self::Unavailable { category, .. } => *category,
        }
    }

    /// Short description suitable for report messages.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Url { url, source, .. } => format!("invalid URL {url}: {source}"),
            Self::Request { url, source, .. } => format!("request to {url} failed: {source}"),
            Self::Status { url, status, .. } => format!("{url} returned HTTP {status}"),
            Self::Decode { url, source, .. } => format!("cannot decode {url}: {source}"),
            Self::Unavailable { reason, .. } => reason.clone(),
        }
    }
}

/// Result alias for source fetches.
pub type SourceResult<T> = Result<T, SourceError>;

/// One category's fetched records.
#[derive(Debug, Clone)]
pub enum FetchedAssets {
    /// Device inventory.
    Devices(Vec<NetworkDevice>),
    /// BGP global configuration.
    BgpGlobal(Vec<BgpGlobal>),
    /// BGP sessions.
    BgpSessions(Vec<BgpSession>),
    /// Peer groups.
    PeerGroups(Vec<PeerGroup>),
    /// Route policies.
    RoutePolicies(Vec<RoutePolicy>),
    /// Prefix lists.
    PrefixLists(Vec<PrefixList>),
    /// Community lists.
    CommunityLists(Vec<CommunityList>),
    /// SNMP configuration.
    Snmp(Vec<SnmpConfig>),
}

impl FetchedAssets {
    /// Category the records belong to.
    #[must_use]
    pub const fn category(&self) -> SourceCategory {
        match self {
            Self::Devices(_) => SourceCategory::Devices,
            Self::BgpGlobal(_) => SourceCategory::BgpGlobal,
            Self::BgpSessions(_) => SourceCategory::BgpSessions,
            Self::PeerGroups(_) => SourceCategory::PeerGroups,
            Self::RoutePolicies(_) => SourceCategory::RoutePolicies,
            Self::PrefixLists(_) => SourceCategory::PrefixLists,
            Self::CommunityLists(_) => SourceCategory::CommunityLists,
            Self::Snmp(_) => SourceCategory::Snmp,
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Devices(records) => records.len(),
            Self::BgpGlobal(records) => records.len(),
            Self::BgpSessions(records) => records.len(),
            Self::PeerGroups(records) => records.len(),
            Self::RoutePolicies(records) => records.len(),
            Self::PrefixLists(records) => records.len(),
            Self::CommunityLists(records) => records.len(),
            Self::Snmp(records) => records.len(),
        }
    }

    /// Whether no records were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inventory backend queried once per category per build.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Network device inventory.
    async fn devices(&self) -> SourceResult<Vec<NetworkDevice>>;

    /// BGP global configuration.
    async fn bgp_global(&self) -> SourceResult<Vec<BgpGlobal>>;

    /// BGP sessions.
    async fn bgp_sessions(&self) -> SourceResult<Vec<BgpSession>>;

    /// Peer groups.
    async fn peer_groups(&self) -> SourceResult<Vec<PeerGroup>>;

    /// Route policies.
    async fn route_policies(&self) -> SourceResult<Vec<RoutePolicy>>;

    /// Prefix lists.
    async fn prefix_lists(&self) -> SourceResult<Vec<PrefixList>>;

    /// Community lists.
    async fn community_lists(&self) -> SourceResult<Vec<CommunityList>>;

    /// SNMP configuration.
    async fn snmp(&self) -> SourceResult<Vec<SnmpConfig>>;

    /// Fetch `category` through the matching method.
    async fn fetch(&self, category: SourceCategory) -> SourceResult<FetchedAssets> {
        Ok(match category {
            SourceCategory::Devices => FetchedAssets::Devices(self.devices().await?),
            SourceCategory::BgpGlobal => FetchedAssets::BgpGlobal(self.bgp_global().await?),
            SourceCategory::BgpSessions => FetchedAssets::BgpSessions(self.bgp_sessions().await?),
            SourceCategory::PeerGroups => FetchedAssets::PeerGroups(self.peer_groups().await?),
            SourceCategory::RoutePolicies => {
                FetchedAssets::RoutePolicies(self.route_policies().await?)
            }
            SourceCategory::PrefixLists => FetchedAssets::PrefixLists(self.prefix_lists().await?),
            SourceCategory::CommunityLists => {
                FetchedAssets::CommunityLists(self.community_lists().await?)
            }
            SourceCategory::Snmp => FetchedAssets::Snmp(self.snmp().await?),
        })
    }
}
