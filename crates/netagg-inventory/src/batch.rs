//! One build's fetched collections.

use std::collections::BTreeSet;

use netagg_config::SourceCategory;

use crate::index::AssetIndex;
use crate::model::{
    BgpGlobal, BgpSession, CommunityList, NetworkDevice, PeerGroup, PrefixList, RoutePolicy,
    SnmpConfig,
};
use crate::source::FetchedAssets;

/// Raw collections of one fetch attempt, one slot per category.
///
/// Owned by a single run and only read once the fetch stage has joined.
#[derive(Debug, Clone, Default)]
pub struct AssetBatch {
    /// Device inventory.
    pub devices: Vec<NetworkDevice>,
    /// BGP global configuration.
    pub bgp_global: Vec<BgpGlobal>,
    /// BGP sessions.
    pub bgp_sessions: Vec<BgpSession>,
    /// Peer groups.
    pub peer_groups: Vec<PeerGroup>,
    /// Route policies.
    pub route_policies: Vec<RoutePolicy>,
    /// Prefix lists.
    pub prefix_lists: Vec<PrefixList>,
    /// Community lists.
    pub community_lists: Vec<CommunityList>,
    /// SNMP configuration.
    pub snmp: Vec<SnmpConfig>,
    missing: BTreeSet<SourceCategory>,
}

impl AssetBatch {
    /// Empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the slot matching `assets`.
    pub fn insert(&mut self, assets: FetchedAssets) {
        self.missing.remove(&assets.category());
        match assets {
            FetchedAssets::Devices(records) => self.devices = records,
            FetchedAssets::BgpGlobal(records) => self.bgp_global = records,
            FetchedAssets::BgpSessions(records) => self.bgp_sessions = records,
            FetchedAssets::PeerGroups(records) => self.peer_groups = records,
            FetchedAssets::RoutePolicies(records) => self.route_policies = records,
            FetchedAssets::PrefixLists(records) => self.prefix_lists = records,
            FetchedAssets::CommunityLists(records) => self.community_lists = records,
            FetchedAssets::Snmp(records) => self.snmp = records,
        }
    }

    /// Record that `category` could not be fetched this run.
    pub fn mark_missing(&mut self, category: SourceCategory) {
        self.missing.insert(category);
    }

    /// Categories that failed to fetch.
    #[must_use]
    pub const fn missing(&self) -> &BTreeSet<SourceCategory> {
        &self.missing
    }

    /// Number of records held for `category`.
    #[must_use]
    pub fn count(&self, category: SourceCategory) -> usize {
        match category {
            SourceCategory::Devices => self.devices.len(),
            SourceCategory::BgpGlobal => self.bgp_global.len(),
            SourceCategory::BgpSessions => self.bgp_sessions.len(),
            SourceCategory::PeerGroups => self.peer_groups.len(),
            SourceCategory::RoutePolicies => self.route_policies.len(),
            SourceCategory::PrefixLists => self.prefix_lists.len(),
            SourceCategory::CommunityLists => self.community_lists.len(),
            SourceCategory::Snmp => self.snmp.len(),
        }
    }

    /// Record counts of every category that was fetched.
    #[must_use]
    pub fn stats(&self) -> Vec<(SourceCategory, usize)> {
        SourceCategory::ALL
            .into_iter()
            .filter(|category| !self.missing.contains(category))
            .map(|category| (category, self.count(category)))
            .collect()
    }

    /// Group every collection by device.
    #[must_use]
    pub fn index(self) -> AssetIndex {
        AssetIndex::build(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_clears_missing_and_stats_skip_failed_categories() {
        let mut batch = AssetBatch::new();
        batch.mark_missing(SourceCategory::Snmp);
        batch.mark_missing(SourceCategory::Devices);
        batch.insert(FetchedAssets::Devices(vec![
            NetworkDevice::new("tor-1"),
            NetworkDevice::new("tor-2"),
        ]));

        assert_eq!(batch.count(SourceCategory::Devices), 2);
        assert_eq!(
            batch.missing().iter().copied().collect::<Vec<_>>(),
            vec![SourceCategory::Snmp]
        );
        let stats = batch.stats();
        assert_eq!(stats.len(), SourceCategory::ALL.len() - 1);
        assert!(stats.contains(&(SourceCategory::Devices, 2)));
        assert!(!stats.iter().any(|(category, _)| *category == SourceCategory::Snmp));
    }
}
