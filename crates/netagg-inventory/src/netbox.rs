//! NetBox-style inventory client.
//!
//! Every endpoint returns `{count, next, results}` pages; `limit=0` asks for
//! the server's maximum page size and `next` is followed until exhausted.

use std::time::Duration;

use async_trait::async_trait;
use netagg_config::{DatacenterFilter, InventoryConfig, SourceCategory};
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::model::{
    BgpGlobal, BgpSession, CommunityList, NetworkDevice, PeerGroup, PrefixList, RoutePolicy,
    SnmpConfig,
};
use crate::source::{AssetSource, SourceError, SourceResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

/// Which datacenter filter an endpoint takes.
#[derive(Debug, Clone, Copy)]
enum Scope {
    None,
    Device,
    RelatedDevice,
}

/// [`AssetSource`] backed by a NetBox instance with the CMDB plugin.
#[derive(Debug, Clone)]
pub struct NetboxSource {
    client: Client,
    base_url: String,
    api_key: String,
    datacenter: String,
    filter: DatacenterFilter,
}

impl NetboxSource {
    /// Build a source with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns the client builder error if TLS initialisation fails.
    pub fn new(config: &InventoryConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Build a source reusing `client`.
    #[must_use]
    pub fn with_client(client: Client, config: &InventoryConfig) -> Self {
        Self {
            client,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
            datacenter: config.datacenter.clone(),
            filter: config.datacenter_filter,
        }
    }

    fn endpoint(&self, category: SourceCategory, path: &str, scope: Scope) -> SourceResult<Url> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|source| SourceError::Url {
            category,
            url: raw.clone(),
            source,
        })?;
        {
            let mut query = url.query_pairs_mut();
            if !self.datacenter.is_empty() {
                match scope {
                    Scope::None => {}
                    Scope::Device => {
                        query.append_pair(self.filter.device_key(), &self.datacenter);
                    }
                    Scope::RelatedDevice => {
                        query.append_pair(self.filter.related_device_key(), &self.datacenter);
                    }
                }
            }
            if matches!(scope, Scope::Device) {
                query.append_pair("role__n", "server");
            }
            query.append_pair("limit", "0");
            query.append_pair("ordering", "id");
        }
        Ok(url)
    }

    async fn get_all<T: DeserializeOwned>(
        &self,
        category: SourceCategory,
        path: &str,
        scope: Scope,
    ) -> SourceResult<Vec<T>> {
        let first = self.endpoint(category, path, scope)?;
        info!(category = %category, url = %first, "fetching inventory");

        let mut results = Vec::new();
        let mut expected = 0;
        let mut next = Some(first.to_string());
        while let Some(url) = next.take() {
            let response = self
                .client
                .get(&url)
                .header(AUTHORIZATION, format!("Token {}", self.api_key))
                .send()
                .await
                .map_err(|source| SourceError::Request {
                    category,
                    url: url.clone(),
                    source,
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Status {
                    category,
                    url,
                    status: status.as_u16(),
                });
            }
            let page: Page<T> = response.json().await.map_err(|source| SourceError::Decode {
                category,
                url: url.clone(),
                source,
            })?;
            expected = page.count;
            results.extend(page.results);
            debug!(category = %category, fetched = results.len(), count = expected, "inventory page received");
            next = page.next.filter(|link| !link.is_empty());
        }

        if expected != results.len() {
            warn!(
                category = %category,
                expected,
                fetched = results.len(),
                "some records have not been fetched"
            );
        }
        Ok(results)
    }
}

#[async_trait]
impl AssetSource for NetboxSource {
    async fn devices(&self) -> SourceResult<Vec<NetworkDevice>> {
        self.get_all(SourceCategory::Devices, "/api/dcim/devices/", Scope::Device)
            .await
    }

    async fn bgp_global(&self) -> SourceResult<Vec<BgpGlobal>> {
        self.get_all(SourceCategory::BgpGlobal, "/api/plugins/cmdb/bgp-global/", Scope::None)
            .await
    }

    async fn bgp_sessions(&self) -> SourceResult<Vec<BgpSession>> {
        self.get_all(SourceCategory::BgpSessions, "/api/plugins/cmdb/bgp-sessions/", Scope::None)
            .await
    }

    async fn peer_groups(&self) -> SourceResult<Vec<PeerGroup>> {
        self.get_all(
            SourceCategory::PeerGroups,
            "/api/plugins/cmdb/peer-groups/",
            Scope::RelatedDevice,
        )
        .await
    }

    async fn route_policies(&self) -> SourceResult<Vec<RoutePolicy>> {
        self.get_all(
            SourceCategory::RoutePolicies,
            "/api/plugins/cmdb/route-policies/",
            Scope::RelatedDevice,
        )
        .await
    }

    async fn prefix_lists(&self) -> SourceResult<Vec<PrefixList>> {
        self.get_all(SourceCategory::PrefixLists, "/api/plugins/cmdb/prefix-lists/", Scope::None)
            .await
    }

    async fn community_lists(&self) -> SourceResult<Vec<CommunityList>> {
        self.get_all(
            SourceCategory::CommunityLists,
            "/api/plugins/cmdb/bgp-community-lists/",
            Scope::None,
        )
        .await
    }

    async fn snmp(&self) -> SourceResult<Vec<SnmpConfig>> {
        self.get_all(SourceCategory::Snmp, "/api/plugins/cmdb/snmp/", Scope::RelatedDevice)
            .await
    }
}
