//! Precomputation: per-device grouping of a fetched batch.
//!
//! The index and the views built from it are read-only once constructed and
//! are shared by reference-counted pointers across compile tasks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use netagg_config::{SourceCategory, SourcePolicy};
use thiserror::Error;
use tracing::warn;

use crate::batch::AssetBatch;
use crate::identity::DeviceIdentity;
use crate::model::{
    BgpGlobal, BgpSession, CommunityList, DeviceRecord, NetworkDevice, PeerGroup, PrefixList,
    RoutePolicy, SnmpConfig,
};

/// Inventory tag marking devices managed by the on-box agent.
pub const AFK_ENABLED_TAG: &str = "afk-enabled";

/// A device lacks data for a required category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required device data missing")]
pub struct MissingDeviceData {
    /// Device that cannot be compiled.
    pub device: DeviceIdentity,
    /// First required category without data.
    pub category: SourceCategory,
}

impl MissingDeviceData {
    /// Report text naming the device and the category.
    #[must_use]
    pub fn detail(&self) -> String {
        format!("no {} found for {}", self.category.label(), self.device)
    }
}

/// Fetched records grouped by [`DeviceIdentity`].
#[derive(Debug, Default)]
pub struct AssetIndex {
    devices: Vec<Arc<NetworkDevice>>,
    bgp_global: HashMap<DeviceIdentity, Arc<BgpGlobal>>,
    bgp_sessions: HashMap<DeviceIdentity, Vec<Arc<BgpSession>>>,
    peer_groups: HashMap<DeviceIdentity, Vec<Arc<PeerGroup>>>,
    route_policies: HashMap<DeviceIdentity, Vec<Arc<RoutePolicy>>>,
    prefix_lists: HashMap<DeviceIdentity, Vec<Arc<PrefixList>>>,
    community_lists: HashMap<DeviceIdentity, Vec<Arc<CommunityList>>>,
    snmp: HashMap<DeviceIdentity, Arc<SnmpConfig>>,
}

fn group<T: DeviceRecord>(records: Vec<T>) -> HashMap<DeviceIdentity, Vec<Arc<T>>> {
    let mut grouped: HashMap<DeviceIdentity, Vec<Arc<T>>> = HashMap::new();
    for record in records {
        grouped
            .entry(DeviceIdentity::new(record.device_name()))
            .or_default()
            .push(Arc::new(record));
    }
    grouped
}

fn single<T: DeviceRecord>(records: Vec<T>) -> HashMap<DeviceIdentity, Arc<T>> {
    records
        .into_iter()
        .map(|record| (DeviceIdentity::new(record.device_name()), Arc::new(record)))
        .collect()
}

impl AssetIndex {
    pub(crate) fn build(batch: AssetBatch) -> Self {
        let AssetBatch {
            devices,
            bgp_global,
            bgp_sessions,
            peer_groups,
            route_policies,
            prefix_lists,
            community_lists,
            snmp,
            ..
        } = batch;

        let mut seen = HashSet::new();
        let devices = devices
            .into_iter()
            .filter(|device| {
                let fresh = seen.insert(device.hostname.clone());
                if !fresh {
                    warn!(device = %device.hostname, "duplicate device in inventory ignored");
                }
                fresh
            })
            .map(Arc::new)
            .collect();

        let mut sessions: HashMap<DeviceIdentity, Vec<Arc<BgpSession>>> = HashMap::new();
        for session in bgp_sessions {
            let session = Arc::new(session);
            let peer_a = DeviceIdentity::new(session.peer_a.device.name.as_str());
            let peer_b = DeviceIdentity::new(session.peer_b.device.name.as_str());
            if peer_a != peer_b {
                sessions.entry(peer_b).or_default().push(Arc::clone(&session));
            }
            sessions.entry(peer_a).or_default().push(session);
        }

        Self {
            devices,
            bgp_global: single(bgp_global),
            bgp_sessions: sessions,
            peer_groups: group(peer_groups),
            route_policies: group(route_policies),
            prefix_lists: group(prefix_lists),
            community_lists: group(community_lists),
            snmp: single(snmp),
        }
    }

    /// Inventory devices, in inventory order, without duplicates.
    #[must_use]
    pub fn devices(&self) -> &[Arc<NetworkDevice>] {
        &self.devices
    }

    /// Whether `hostname` has any record of `category`.
    #[must_use]
    pub fn has(&self, category: SourceCategory, hostname: &str) -> bool {
        match category {
            SourceCategory::Devices => self.devices.iter().any(|device| device.hostname == hostname),
            SourceCategory::BgpGlobal => self.bgp_global.contains_key(hostname),
            SourceCategory::BgpSessions => self.bgp_sessions.contains_key(hostname),
            SourceCategory::PeerGroups => self.peer_groups.contains_key(hostname),
            SourceCategory::RoutePolicies => self.route_policies.contains_key(hostname),
            SourceCategory::PrefixLists => self.prefix_lists.contains_key(hostname),
            SourceCategory::CommunityLists => self.community_lists.contains_key(hostname),
            SourceCategory::Snmp => self.snmp.contains_key(hostname),
        }
    }
}

/// Everything one device's compilation needs.
#[derive(Debug, Clone)]
pub struct DeviceView {
    /// Join key.
    pub identity: DeviceIdentity,
    /// Inventory record.
    pub device: Arc<NetworkDevice>,
    /// BGP global configuration, if any.
    pub bgp_global: Option<Arc<BgpGlobal>>,
    /// Sessions the device terminates.
    pub sessions: Vec<Arc<BgpSession>>,
    /// Peer groups.
    pub peer_groups: Vec<Arc<PeerGroup>>,
    /// Route policies.
    pub route_policies: Vec<Arc<RoutePolicy>>,
    /// Prefix lists.
    pub prefix_lists: Vec<Arc<PrefixList>>,
    /// Community lists.
    pub community_lists: Vec<Arc<CommunityList>>,
    /// SNMP configuration, if any.
    pub snmp: Option<Arc<SnmpConfig>>,
    /// Device carries the [`AFK_ENABLED_TAG`] tag.
    pub afk_enabled: bool,
}

fn cloned<T>(map: &HashMap<DeviceIdentity, Vec<Arc<T>>>, hostname: &str) -> Vec<Arc<T>> {
    map.get(hostname).cloned().unwrap_or_default()
}

impl DeviceView {
    /// Collect `device`'s records from `index`.
    ///
    /// A category that `policy` marks as required must hold data for the
    /// device. A category whose fetch failed this run holds no data.
    ///
    /// # Errors
    ///
    /// Returns [`MissingDeviceData`] naming the first required category
    /// without data for the device.
    pub fn assemble(
        device: &Arc<NetworkDevice>,
        index: &AssetIndex,
        policy: &SourcePolicy,
    ) -> Result<Self, MissingDeviceData> {
        let hostname = device.hostname.as_str();
        let identity = device.identity();

        if let Some(category) = SourceCategory::ALL.into_iter().find(|category| {
            policy.is_required(*category) && !index.has(*category, hostname)
        }) {
            return Err(MissingDeviceData {
                device: identity,
                category,
            });
        }

        Ok(Self {
            identity,
            device: Arc::clone(device),
            bgp_global: index.bgp_global.get(hostname).cloned(),
            sessions: cloned(&index.bgp_sessions, hostname),
            peer_groups: cloned(&index.peer_groups, hostname),
            route_policies: cloned(&index.route_policies, hostname),
            prefix_lists: cloned(&index.prefix_lists, hostname),
            community_lists: cloned(&index.community_lists, hostname),
            snmp: index.snmp.get(hostname).cloned(),
            afk_enabled: device.has_tag(AFK_ENABLED_TAG),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceRef, SessionEndpoint, Tag};
    use netagg_config::{Criticality, SourceRule};

    fn session(a: &str, b: &str) -> BgpSession {
        BgpSession {
            peer_a: SessionEndpoint {
                device: DeviceRef::new(a),
                ..SessionEndpoint::default()
            },
            peer_b: SessionEndpoint {
                device: DeviceRef::new(b),
                ..SessionEndpoint::default()
            },
            ..BgpSession::default()
        }
    }

    fn complete_batch(hostnames: &[&str]) -> AssetBatch {
        let mut batch = AssetBatch::new();
        for hostname in hostnames {
            batch.devices.push(NetworkDevice::new(*hostname));
            batch.peer_groups.push(PeerGroup {
                device: DeviceRef::new(*hostname),
                name: "SPINES".to_string(),
                ..PeerGroup::default()
            });
            batch.route_policies.push(RoutePolicy {
                device: DeviceRef::new(*hostname),
                name: "RP-IN".to_string(),
                ..RoutePolicy::default()
            });
            batch.prefix_lists.push(PrefixList {
                device: DeviceRef::new(*hostname),
                name: "PL-LOOPBACKS".to_string(),
                ..PrefixList::default()
            });
            batch.community_lists.push(CommunityList {
                device: DeviceRef::new(*hostname),
                name: "CL-DC".to_string(),
                ..CommunityList::default()
            });
        }
        batch
    }

    #[test]
    fn sessions_are_indexed_under_both_peers() {
        let mut batch = complete_batch(&["tor-1", "spine-1"]);
        batch.bgp_sessions.push(session("tor-1", "spine-1"));
        let index = batch.index();

        assert!(index.has(SourceCategory::BgpSessions, "tor-1"));
        assert!(index.has(SourceCategory::BgpSessions, "spine-1"));
        let policy = SourcePolicy::default();
        for device in index.devices() {
            let view = DeviceView::assemble(device, &index, &policy);
            assert!(matches!(view, Ok(ref view) if view.sessions.len() == 1));
        }
    }

    #[test]
    fn missing_required_category_is_named() {
        let mut batch = complete_batch(&["a", "b"]);
        batch.bgp_sessions.push(session("a", "spine-9"));
        let index = batch.index();
        let policy = SourcePolicy::default();

        let missing = index
            .devices()
            .iter()
            .filter_map(|device| DeviceView::assemble(device, &index, &policy).err())
            .collect::<Vec<_>>();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].device.as_str(), "b");
        assert_eq!(missing[0].category, SourceCategory::BgpSessions);
        assert_eq!(missing[0].detail(), "no BGP sessions found for b");
    }

    #[test]
    fn failed_required_category_still_fails_devices() {
        let mut batch = complete_batch(&["a"]);
        batch.bgp_sessions.push(session("a", "z"));
        batch.peer_groups.clear();
        batch.mark_missing(SourceCategory::PeerGroups);
        let index = batch.index();
        let device = Arc::clone(&index.devices()[0]);

        let err = DeviceView::assemble(&device, &index, &SourcePolicy::default()).err();
        assert_eq!(err.map(|err| err.detail()), Some("no peer-groups found for a".to_string()));
    }

    #[test]
    fn optional_best_effort_categories_may_be_absent() {
        let mut batch = complete_batch(&["a"]);
        batch.bgp_sessions.push(session("a", "z"));
        batch.mark_missing(SourceCategory::Snmp);
        let index = batch.index();
        let device = Arc::clone(&index.devices()[0]);

        let view = DeviceView::assemble(&device, &index, &SourcePolicy::default());
        assert!(matches!(view, Ok(ref view) if view.snmp.is_none()));

        let strict_snmp = SourcePolicy::default().with_rule(
            SourceCategory::Snmp,
            SourceRule {
                criticality: Criticality::BestEffort,
                required: true,
            },
        );
        let err = DeviceView::assemble(&device, &index, &strict_snmp).err();
        assert_eq!(err.map(|err| err.category), Some(SourceCategory::Snmp));
    }

    #[test]
    fn duplicate_devices_are_dropped_and_tags_mapped() {
        let mut batch = complete_batch(&["a"]);
        batch.devices.push(NetworkDevice::new("a"));
        batch.devices[0].tags.push(Tag {
            name: AFK_ENABLED_TAG.to_string(),
        });
        batch.bgp_sessions.push(session("a", "b"));
        let index = batch.index();

        assert_eq!(index.devices().len(), 1);
        let view = DeviceView::assemble(&index.devices()[0], &index, &SourcePolicy::default());
        assert!(matches!(view, Ok(view) if view.afk_enabled && view.bgp_global.is_none()));
    }
}
