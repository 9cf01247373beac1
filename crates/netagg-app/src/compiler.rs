//! Reference device compiler rendering OpenConfig and IETF JSON documents.
//!
//! Output is deterministic: neighbors are ordered by address, named objects by
//! name and policy statements by sequence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use netagg_inventory::{
    BgpGlobal, CommunityList, CompileError, CompiledArtifact, Decision, DeviceCompiler,
    DeviceIdentity, DeviceView, IpVersion, NamedRef, PeerGroup, PrefixList, PrefixListTerm,
    RoutePolicy, RoutePolicyTerm, SessionStatus, SnmpConfig,
};
use serde_json::{Map, Value, json};

/// Renders the subset of both schemas the downstream agents consume.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCompiler;

impl DeviceCompiler for ReferenceCompiler {
    fn compile(&self, view: &DeviceView) -> Result<CompiledArtifact, CompileError> {
        let names = DefinedNames::collect(view);
        let mut bgp = Map::new();
        if let Some(global) = &view.bgp_global {
            bgp.insert("global".to_string(), bgp_global(global));
        }
        bgp.insert(
            "neighbors".to_string(),
            json!({ "neighbor": neighbors(view, &names)? }),
        );
        bgp.insert(
            "peer-groups".to_string(),
            json!({ "peer-group": peer_groups(view, &names)? }),
        );

        let openconfig = json!({
            "openconfig-network-instance:network-instances": {
                "network-instance": [{
                    "name": "default",
                    "protocols": {
                        "protocol": [{
                            "identifier": "openconfig-policy-types:BGP",
                            "name": "BGP",
                            "bgp": bgp,
                        }]
                    }
                }]
            },
            "openconfig-routing-policy:routing-policy": {
                "defined-sets": {
                    "prefix-sets": { "prefix-set": prefix_sets(&view.prefix_lists) },
                    "openconfig-bgp-policy:bgp-defined-sets": {
                        "community-sets": { "community-set": community_sets(&view.community_lists) }
                    }
                },
                "policy-definitions": {
                    "policy-definition": policy_definitions(view, &names)?
                }
            }
        });

        Ok(CompiledArtifact {
            openconfig,
            ietf: view.snmp.as_deref().map_or_else(|| json!({}), ietf_documents),
            afk_enabled: view.afk_enabled,
        })
    }
}

/// Names the device defines, used to validate references.
struct DefinedNames<'a> {
    peer_groups: BTreeSet<&'a str>,
    route_policies: BTreeSet<&'a str>,
    prefix_lists: BTreeSet<&'a str>,
    community_lists: BTreeSet<&'a str>,
}

impl<'a> DefinedNames<'a> {
    fn collect(view: &'a DeviceView) -> Self {
        Self {
            peer_groups: view.peer_groups.iter().map(|group| group.name.as_str()).collect(),
            route_policies: view
                .route_policies
                .iter()
                .map(|policy| policy.name.as_str())
                .collect(),
            prefix_lists: view.prefix_lists.iter().map(|list| list.name.as_str()).collect(),
            community_lists: view
                .community_lists
                .iter()
                .map(|list| list.name.as_str())
                .collect(),
        }
    }
}

/// Name of `reference` when set and non-empty, after checking `defined` holds it.
fn resolve<'r>(
    device: &DeviceIdentity,
    kind: &'static str,
    defined: &BTreeSet<&str>,
    reference: Option<&'r NamedRef>,
) -> Result<Option<&'r str>, CompileError> {
    match reference.map(|reference| reference.name.as_str()) {
        None | Some("") => Ok(None),
        Some(name) if defined.contains(name) => Ok(Some(name)),
        Some(name) => Err(CompileError::UndefinedReference {
            device: device.clone(),
            kind,
            name: name.to_string(),
        }),
    }
}

fn apply_policy(
    device: &DeviceIdentity,
    names: &DefinedNames<'_>,
    import: Option<&NamedRef>,
    export: Option<&NamedRef>,
) -> Result<Value, CompileError> {
    let import = resolve(device, "route-policy", &names.route_policies, import)?;
    let export = resolve(device, "route-policy", &names.route_policies, export)?;
    Ok(json!({
        "config": {
            "import-policy": import.into_iter().collect::<Vec<_>>(),
            "export-policy": export.into_iter().collect::<Vec<_>>(),
        }
    }))
}

fn bgp_global(global: &BgpGlobal) -> Value {
    let mut config = Map::new();
    config.insert("as".to_string(), json!(global.local_asn.number));
    if !global.router_id.is_empty() {
        config.insert("router-id".to_string(), json!(global.router_id));
    }
    json!({
        "config": config,
        "default-route-distance": {
            "config": {
                "external-route-distance": global.ebgp_administrative_distance,
                "internal-route-distance": global.ibgp_administrative_distance,
            }
        },
        "graceful-restart": {
            "config": {
                "enabled": global.graceful_restart_enabled,
                "restart-time": global.graceful_restart_time,
            }
        },
        "use-multiple-paths": {
            "config": { "enabled": global.ecmp_enabled },
            "ebgp": { "config": { "maximum-paths": global.ecmp_maximum_paths } },
            "ibgp": { "config": { "maximum-paths": global.ecmp_maximum_paths } },
        }
    })
}

fn neighbors(view: &DeviceView, names: &DefinedNames<'_>) -> Result<Vec<Value>, CompileError> {
    let device = &view.identity;
    let mut rendered = BTreeMap::new();
    for session in &view.sessions {
        let (local, remote) =
            session
                .sides(device.as_str())
                .ok_or_else(|| CompileError::ForeignSession {
                    device: device.clone(),
                    peers: (
                        session.peer_a.device.name.clone(),
                        session.peer_b.device.name.clone(),
                    ),
                })?;
        let address = remote.local_address.host().to_string();
        let peer_group = resolve(device, "peer-group", &names.peer_groups, local.peer_group.as_ref())?;

        let mut afi_safis = Vec::with_capacity(local.afi_safis.len());
        for afi_safi in &local.afi_safis {
            afi_safis.push(json!({
                "afi-safi-name": afi_safi.name.openconfig_name(),
                "config": {
                    "afi-safi-name": afi_safi.name.openconfig_name(),
                    "enabled": true,
                },
                "apply-policy": apply_policy(
                    device,
                    names,
                    afi_safi.route_policy_in.as_ref(),
                    afi_safi.route_policy_out.as_ref(),
                )?,
            }));
        }

        let mut config = Map::new();
        config.insert("neighbor-address".to_string(), json!(address));
        config.insert("enabled".to_string(), json!(session.status == SessionStatus::Active));
        config.insert("peer-as".to_string(), json!(remote.local_asn.number));
        config.insert("local-as".to_string(), json!(local.local_asn.number));
        config.insert("auth-password".to_string(), json!(session.password));
        config.insert("description".to_string(), json!(local.description));
        if let Some(peer_group) = peer_group {
            config.insert("peer-group".to_string(), json!(peer_group));
        }

        let neighbor = json!({
            "neighbor-address": address,
            "config": config,
            "apply-policy": apply_policy(
                device,
                names,
                local.route_policy_in.as_ref(),
                local.route_policy_out.as_ref(),
            )?,
            "afi-safis": { "afi-safi": afi_safis },
        });
        rendered.insert(address, neighbor);
    }
    Ok(rendered.into_values().collect())
}

fn peer_groups(view: &DeviceView, names: &DefinedNames<'_>) -> Result<Vec<Value>, CompileError> {
    let mut groups: Vec<&PeerGroup> = view.peer_groups.iter().map(AsRef::as_ref).collect();
    groups.sort_by(|left, right| left.name.cmp(&right.name));
    groups
        .into_iter()
        .map(|group| {
            let mut config = Map::new();
            config.insert("peer-group-name".to_string(), json!(group.name));
            config.insert("description".to_string(), json!(group.description));
            if let Some(asn) = &group.local_asn {
                config.insert("local-as".to_string(), json!(asn.number));
            }
            if let Some(asn) = &group.remote_asn {
                config.insert("peer-as".to_string(), json!(asn.number));
            }
            Ok(json!({
                "peer-group-name": group.name,
                "config": config,
                "apply-policy": apply_policy(
                    &view.identity,
                    names,
                    group.route_policy_in.as_ref(),
                    group.route_policy_out.as_ref(),
                )?,
            }))
        })
        .collect()
}

/// OpenConfig mask length range of a prefix list term.
fn mask_length_range(term: &PrefixListTerm) -> String {
    if term.le == 0 && term.ge == 0 {
        return "exact".to_string();
    }
    let (host, length) = term
        .prefix
        .split_once('/')
        .unwrap_or((term.prefix.as_str(), ""));
    let start = if term.ge > 0 {
        term.ge.to_string()
    } else {
        length.to_string()
    };
    let end = if term.le > 0 {
        term.le.to_string()
    } else if host.contains(':') {
        "128".to_string()
    } else {
        "32".to_string()
    };
    format!("{start}..{end}")
}

fn prefix_sets(lists: &[Arc<PrefixList>]) -> Vec<Value> {
    let mut sorted: Vec<&PrefixList> = lists.iter().map(AsRef::as_ref).collect();
    sorted.sort_by(|left, right| left.name.cmp(&right.name));
    sorted
        .into_iter()
        .map(|list| {
            let mode = match list.ip_version {
                IpVersion::Ipv4 => "IPV4",
                IpVersion::Ipv6 => "IPV6",
            };
            let prefixes: Vec<Value> = list
                .terms
                .iter()
                .map(|term| {
                    let range = mask_length_range(term);
                    json!({
                        "ip-prefix": term.prefix,
                        "masklength-range": range,
                        "config": { "ip-prefix": term.prefix, "masklength-range": range },
                    })
                })
                .collect();
            json!({
                "name": list.name,
                "config": { "name": list.name, "mode": mode },
                "prefixes": { "prefix": prefixes },
            })
        })
        .collect()
}

fn community_sets(lists: &[Arc<CommunityList>]) -> Vec<Value> {
    let mut sorted: Vec<&CommunityList> = lists.iter().map(AsRef::as_ref).collect();
    sorted.sort_by(|left, right| left.name.cmp(&right.name));
    sorted
        .into_iter()
        .map(|list| {
            let members: Vec<&str> = list.terms.iter().map(|term| term.community.as_str()).collect();
            json!({
                "community-set-name": list.name,
                "config": { "community-set-name": list.name, "community-member": members },
            })
        })
        .collect()
}

fn statement(
    device: &DeviceIdentity,
    names: &DefinedNames<'_>,
    policy: &RoutePolicy,
    term: &RoutePolicyTerm,
) -> Result<Value, CompileError> {
    let mut bgp_conditions = Map::new();
    if term.from_local_pref > 0 {
        bgp_conditions.insert("local-pref-eq".to_string(), json!(term.from_local_pref));
    }
    if let Some(name) = resolve(
        device,
        "community-list",
        &names.community_lists,
        term.from_bgp_community_list.as_ref(),
    )? {
        bgp_conditions.insert("community-set".to_string(), json!(name));
    }
    let mut conditions = Map::new();
    if let Some(name) = resolve(
        device,
        "prefix-list",
        &names.prefix_lists,
        term.from_prefix_list.as_ref(),
    )? {
        conditions.insert(
            "match-prefix-set".to_string(),
            json!({ "config": { "prefix-set": name } }),
        );
    }
    conditions.insert(
        "bgp-conditions".to_string(),
        json!({ "config": bgp_conditions }),
    );

    let mut bgp_actions = Map::new();
    if let Some(asn) = &term.set_as_path_prepend_asn {
        if term.set_as_path_prepend_repeat == 0 {
            return Err(CompileError::InvalidTerm {
                device: device.clone(),
                policy: policy.name.clone(),
                sequence: term.sequence,
                reason: "as_path_prepend_repeat must be positive",
            });
        }
        bgp_actions.insert(
            "set-as-path-prepend".to_string(),
            json!({ "config": { "asn": asn.number, "repeat-n": term.set_as_path_prepend_repeat } }),
        );
    }
    let communities: Vec<&str> = term.set_community.split_whitespace().collect();
    if !communities.is_empty() {
        bgp_actions.insert(
            "set-community".to_string(),
            json!({
                "config": { "method": "INLINE", "options": "REPLACE" },
                "inline": { "config": { "communities": communities } },
            }),
        );
    }
    let mut action_config = Map::new();
    if term.set_metric > 0 {
        action_config.insert("set-med".to_string(), json!(term.set_metric));
    }
    if term.set_local_pref > 0 {
        action_config.insert("set-local-pref".to_string(), json!(term.set_local_pref));
    }
    if let Some(next_hop) = term.set_next_hop {
        action_config.insert("set-next-hop".to_string(), json!(next_hop.to_string()));
    }
    bgp_actions.insert("config".to_string(), Value::Object(action_config));

    let result = match term.decision {
        Decision::Permit => "ACCEPT_ROUTE",
        Decision::Deny => "REJECT_ROUTE",
    };
    Ok(json!({
        "name": term.sequence.to_string(),
        "config": { "name": term.sequence.to_string() },
        "conditions": conditions,
        "actions": {
            "config": { "policy-result": result },
            "bgp-actions": bgp_actions,
        },
    }))
}

fn policy_definitions(
    view: &DeviceView,
    names: &DefinedNames<'_>,
) -> Result<Vec<Value>, CompileError> {
    let mut policies: Vec<&RoutePolicy> = view.route_policies.iter().map(AsRef::as_ref).collect();
    policies.sort_by(|left, right| left.name.cmp(&right.name));
    let mut rendered = Vec::with_capacity(policies.len());
    for policy in policies {
        let mut terms: Vec<&RoutePolicyTerm> = policy.terms.iter().collect();
        terms.sort_by_key(|term| term.sequence);
        let statements = terms
            .into_iter()
            .map(|term| statement(&view.identity, names, policy, term))
            .collect::<Result<Vec<_>, _>>()?;
        rendered.push(json!({
            "name": policy.name,
            "config": { "name": policy.name },
            "statements": { "statement": statements },
        }));
    }
    Ok(rendered)
}

fn ietf_documents(snmp: &SnmpConfig) -> Value {
    let mut system = Map::new();
    if !snmp.contact.is_empty() {
        system.insert("contact".to_string(), json!(snmp.contact));
    }
    if !snmp.location.is_empty() {
        system.insert("location".to_string(), json!(snmp.location));
    }
    let mut communities: Vec<_> = snmp.community_list.iter().collect();
    communities.sort_by(|left, right| left.name.cmp(&right.name));
    let communities: Vec<Value> = communities
        .into_iter()
        .map(|community| {
            json!({
                "index": community.name,
                "security-name": community.kind,
                "text-name": community.community,
            })
        })
        .collect();
    json!({
        "ietf-system:system": system,
        "ietf-snmp:snmp": { "community": communities },
    })
}
