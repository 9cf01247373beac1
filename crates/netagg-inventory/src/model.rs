//! Inventory records, deserialised from the inventory API's JSON.
//!
//! Every per-device record carries a [`DeviceRef`] naming the device it
//! belongs to; [`DeviceRecord`] exposes that join key generically.

use std::net::IpAddr;

use serde::Deserialize;

use crate::identity::DeviceIdentity;

/// Reference to a device by hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceRef {
    /// Hostname.
    pub name: String,
}

impl DeviceRef {
    /// Reference `hostname`.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            name: hostname.into(),
        }
    }
}

/// Reference to another named record (policy, prefix list, peer group).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    /// Referenced name.
    pub name: String,
}

/// Inventory tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
}

/// Autonomous system number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Asn {
    /// AS number.
    pub number: u32,
    /// Owning organisation.
    #[serde(default, rename = "organization_name")]
    pub organization: String,
}

/// Device from the network inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkDevice {
    /// Unique hostname.
    #[serde(rename = "name")]
    pub hostname: String,
    /// Serial number, possibly empty.
    #[serde(default)]
    pub serial: String,
    /// Inventory tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl NetworkDevice {
    /// Device with `hostname` and no tags.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Join key.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.hostname.clone())
    }

    /// Whether the device carries tag `name`.
    #[must_use]
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }
}

/// Per-device BGP global configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BgpGlobal {
    /// Owning device.
    pub device: DeviceRef,
    /// Local AS.
    pub local_asn: Asn,
    /// eBGP administrative distance.
    #[serde(default)]
    pub ebgp_administrative_distance: Option<u8>,
    /// iBGP administrative distance.
    #[serde(default)]
    pub ibgp_administrative_distance: Option<u8>,
    /// Graceful restart.
    #[serde(default, rename = "graceful_restart")]
    pub graceful_restart_enabled: bool,
    /// Graceful restart timer in seconds.
    #[serde(default)]
    pub graceful_restart_time: Option<u16>,
    /// ECMP.
    #[serde(default, rename = "ecmp")]
    pub ecmp_enabled: bool,
    /// ECMP path limit.
    #[serde(default)]
    pub ecmp_maximum_paths: Option<u32>,
    /// Router ID, possibly empty.
    #[serde(default)]
    pub router_id: String,
}

/// Address family of a BGP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AfiSafiName {
    /// IPv4 unicast.
    #[serde(rename = "ipv4-unicast")]
    Ipv4Unicast,
    /// IPv6 unicast.
    #[serde(rename = "ipv6-unicast")]
    Ipv6Unicast,
    /// L2VPN EVPN.
    #[serde(rename = "l2vpn-evpn")]
    L2vpnEvpn,
}

impl AfiSafiName {
    /// OpenConfig identity for the family.
    #[must_use]
    pub const fn openconfig_name(self) -> &'static str {
        match self {
            Self::Ipv4Unicast => "openconfig-bgp-types:IPV4_UNICAST",
            Self::Ipv6Unicast => "openconfig-bgp-types:IPV6_UNICAST",
            Self::L2vpnEvpn => "openconfig-bgp-types:L2VPN_EVPN",
        }
    }
}

/// Address family enabled on one side of a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AfiSafi {
    /// Family.
    #[serde(rename = "afi_safi_name")]
    pub name: AfiSafiName,
    /// Import policy.
    #[serde(default)]
    pub route_policy_in: Option<NamedRef>,
    /// Export policy.
    #[serde(default)]
    pub route_policy_out: Option<NamedRef>,
}

/// Interface address of a session endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PeerAddress {
    /// Address in CIDR notation.
    pub address: String,
    /// IP family (4 or 6).
    #[serde(default)]
    pub family: u8,
}

impl PeerAddress {
    /// Address without its prefix length.
    #[must_use]
    pub fn host(&self) -> &str {
        self.address
            .split_once('/')
            .map_or(self.address.as_str(), |(host, _)| host)
    }
}

/// One side of a BGP session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionEndpoint {
    /// Device terminating this side.
    pub device: DeviceRef,
    /// AS of this side.
    pub local_asn: Asn,
    /// Peer group the neighbor belongs to.
    #[serde(default)]
    pub peer_group: Option<NamedRef>,
    /// Import policy.
    #[serde(default)]
    pub route_policy_in: Option<NamedRef>,
    /// Export policy.
    #[serde(default)]
    pub route_policy_out: Option<NamedRef>,
    /// Enabled address families.
    #[serde(default)]
    pub afi_safis: Vec<AfiSafi>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Local interface address.
    pub local_address: PeerAddress,
    /// Prefix limit, 0 for none.
    #[serde(default)]
    pub maximum_prefixes: u32,
    /// Enforce first AS.
    #[serde(default)]
    pub enforce_first_as: bool,
}

/// Administrative status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// In service.
    #[default]
    Active,
    /// Configured but shut down.
    Planned,
    /// Administratively down.
    Offline,
    /// Anything else the inventory reports.
    #[serde(other)]
    Other,
}

/// BGP session between two devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BgpSession {
    /// MD5 password, possibly empty.
    #[serde(default)]
    pub password: String,
    /// Administrative status.
    #[serde(default)]
    pub status: SessionStatus,
    /// First endpoint.
    pub peer_a: SessionEndpoint,
    /// Second endpoint.
    pub peer_b: SessionEndpoint,
}

impl BgpSession {
    /// Split the session into `(local, remote)` sides for `hostname`.
    ///
    /// Returns `None` when neither side belongs to `hostname`.
    #[must_use]
    pub fn sides(&self, hostname: &str) -> Option<(&SessionEndpoint, &SessionEndpoint)> {
        if self.peer_a.device.name == hostname {
            Some((&self.peer_a, &self.peer_b))
        } else if self.peer_b.device.name == hostname {
            Some((&self.peer_b, &self.peer_a))
        } else {
            None
        }
    }
}

/// BGP peer group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PeerGroup {
    /// Owning device.
    pub device: DeviceRef,
    /// Group name.
    pub name: String,
    /// Remote AS.
    #[serde(default)]
    pub remote_asn: Option<Asn>,
    /// Local AS override.
    #[serde(default)]
    pub local_asn: Option<Asn>,
    /// Import policy.
    #[serde(default)]
    pub route_policy_in: Option<NamedRef>,
    /// Export policy.
    #[serde(default)]
    pub route_policy_out: Option<NamedRef>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Enforce first AS.
    #[serde(default)]
    pub enforce_first_as: bool,
}

/// Prefix list address family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// IPv4.
    #[default]
    Ipv4,
    /// IPv6.
    Ipv6,
}

/// Prefix list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PrefixListTerm {
    /// Prefix in CIDR notation.
    pub prefix: String,
    /// Upper mask bound, 0 for none.
    #[serde(default)]
    pub le: u8,
    /// Lower mask bound, 0 for none.
    #[serde(default)]
    pub ge: u8,
}

/// Named prefix list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PrefixList {
    /// Owning device.
    pub device: DeviceRef,
    /// List name.
    pub name: String,
    /// Address family.
    pub ip_version: IpVersion,
    /// Entries.
    #[serde(default)]
    pub terms: Vec<PrefixListTerm>,
}

/// Community list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommunityListTerm {
    /// Community value.
    pub community: String,
}

/// Named BGP community list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommunityList {
    /// Owning device.
    pub device: DeviceRef,
    /// List name.
    pub name: String,
    /// Entries.
    #[serde(default)]
    pub terms: Vec<CommunityListTerm>,
}

/// Route policy term outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Accept the route.
    #[default]
    Permit,
    /// Reject the route.
    Deny,
}

/// One route policy statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoutePolicyTerm {
    /// Sequence number, also the statement name.
    pub sequence: u32,
    /// Outcome.
    pub decision: Decision,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Match on a community list.
    #[serde(default)]
    pub from_bgp_community_list: Option<NamedRef>,
    /// Match on a prefix list.
    #[serde(default)]
    pub from_prefix_list: Option<NamedRef>,
    /// Match on local preference, 0 for none.
    #[serde(default)]
    pub from_local_pref: u32,
    /// AS to prepend.
    #[serde(default)]
    pub set_as_path_prepend_asn: Option<Asn>,
    /// Prepend count; must be positive when an AS is set.
    #[serde(default)]
    pub set_as_path_prepend_repeat: u8,
    /// Space-separated communities to set.
    #[serde(default)]
    pub set_community: String,
    /// Local preference to set, 0 for none.
    #[serde(default)]
    pub set_local_pref: u32,
    /// MED to set, 0 for none.
    #[serde(default)]
    pub set_metric: u32,
    /// Next hop to set.
    #[serde(default)]
    pub set_next_hop: Option<IpAddr>,
}

/// Named route policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoutePolicy {
    /// Owning device.
    pub device: DeviceRef,
    /// Policy name.
    pub name: String,
    /// Statements.
    #[serde(default)]
    pub terms: Vec<RoutePolicyTerm>,
}

/// SNMP community.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnmpCommunity {
    /// Community index.
    pub name: String,
    /// Community string.
    pub community: String,
    /// Access type (e.g. `readonly`).
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Per-device SNMP configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnmpConfig {
    /// Owning device.
    pub device: DeviceRef,
    /// System location.
    #[serde(default)]
    pub location: String,
    /// System contact.
    #[serde(default)]
    pub contact: String,
    /// Communities.
    #[serde(default)]
    pub community_list: Vec<SnmpCommunity>,
}

/// Record attached to exactly one device.
pub trait DeviceRecord {
    /// Hostname of the owning device.
    fn device_name(&self) -> &str;
}

macro_rules! device_record {
    ($($record:ty),+ $(,)?) => {
        $(
            impl DeviceRecord for $record {
                fn device_name(&self) -> &str {
                    &self.device.name
                }
            }
        )+
    };
}

device_record!(BgpGlobal, PeerGroup, PrefixList, CommunityList, RoutePolicy, SnmpConfig);
