//! In-memory doubles for the source and compiler seams.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use netagg_inventory::{
    AssetBatch, AssetSource, BgpGlobal, BgpSession, CommunityList, CompileError, CompiledArtifact,
    DeviceCompiler, DeviceRef, DeviceView, NetworkDevice, PeerGroup, PrefixList, RoutePolicy,
    SessionEndpoint, SnmpConfig, SourceCategory, SourceError, SourceResult,
};
use serde_json::json;
use tokio::sync::Semaphore;

/// Complete inventory for `hostnames`: each device gets one session towards
/// an upstream peer outside the inventory plus every required record.
pub(crate) fn inventory(hostnames: &[&str]) -> AssetBatch {
    let mut batch = AssetBatch::new();
    for hostname in hostnames {
        let owned = |name: &str| (DeviceRef::new(*hostname), name.to_string());
        batch.devices.push(NetworkDevice::new(*hostname));
        batch.bgp_sessions.push(BgpSession {
            peer_a: SessionEndpoint {
                device: DeviceRef::new(*hostname),
                ..SessionEndpoint::default()
            },
            peer_b: SessionEndpoint {
                device: DeviceRef::new(format!("upstream-{hostname}")),
                ..SessionEndpoint::default()
            },
            ..BgpSession::default()
        });
        let (device, name) = owned("UPSTREAM");
        batch.peer_groups.push(PeerGroup {
            device,
            name,
            ..PeerGroup::default()
        });
        let (device, name) = owned("RP-UPSTREAM-IN");
        batch.route_policies.push(RoutePolicy {
            device,
            name,
            ..RoutePolicy::default()
        });
        let (device, name) = owned("PL-LOOPBACKS");
        batch.prefix_lists.push(PrefixList {
            device,
            name,
            ..PrefixList::default()
        });
        let (device, name) = owned("CL-INTERNAL");
        batch.community_lists.push(CommunityList {
            device,
            name,
            ..CommunityList::default()
        });
    }
    batch
}

#[derive(Default)]
struct Script {
    failing: HashSet<SourceCategory>,
    stalling: HashSet<SourceCategory>,
}

/// Serves a fixed [`AssetBatch`], with scripted failures.
#[derive(Clone)]
pub(crate) struct ScriptedSource {
    data: Arc<AssetBatch>,
    script: Arc<Mutex<Script>>,
    gate: Option<Arc<Semaphore>>,
    device_fetches: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub(crate) fn new(data: AssetBatch) -> Self {
        Self {
            data: Arc::new(data),
            script: Arc::default(),
            gate: None,
            device_fetches: Arc::default(),
        }
    }

    pub(crate) fn failing(self, category: SourceCategory) -> Self {
        self.set_failing(category, true);
        self
    }

    pub(crate) fn stalling(self, category: SourceCategory) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stalling
            .insert(category);
        self
    }

    /// Every device fetch waits for one permit of `gate`.
    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn set_failing(&self, category: SourceCategory, failing: bool) {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        if failing {
            script.failing.insert(category);
        } else {
            script.failing.remove(&category);
        }
    }

    /// Number of device fetches, one per run.
    pub(crate) fn runs(&self) -> usize {
        self.device_fetches.load(Ordering::SeqCst)
    }

    async fn serve<T: Clone>(
        &self,
        category: SourceCategory,
        records: impl FnOnce(&AssetBatch) -> &Vec<T>,
    ) -> SourceResult<Vec<T>> {
        let (failing, stalling) = {
            let script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            (
                script.failing.contains(&category),
                script.stalling.contains(&category),
            )
        };
        if stalling {
            std::future::pending::<()>().await;
        }
        if failing {
            return Err(SourceError::Unavailable {
                category,
                reason: "scripted outage".to_string(),
            });
        }
        Ok(records(&self.data).clone())
    }
}

#[async_trait]
impl AssetSource for ScriptedSource {
    async fn devices(&self) -> SourceResult<Vec<NetworkDevice>> {
        self.device_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.serve(SourceCategory::Devices, |batch| &batch.devices).await
    }

    async fn bgp_global(&self) -> SourceResult<Vec<BgpGlobal>> {
        self.serve(SourceCategory::BgpGlobal, |batch| &batch.bgp_global).await
    }

    async fn bgp_sessions(&self) -> SourceResult<Vec<BgpSession>> {
        self.serve(SourceCategory::BgpSessions, |batch| &batch.bgp_sessions)
            .await
    }

    async fn peer_groups(&self) -> SourceResult<Vec<PeerGroup>> {
        self.serve(SourceCategory::PeerGroups, |batch| &batch.peer_groups)
            .await
    }

    async fn route_policies(&self) -> SourceResult<Vec<RoutePolicy>> {
        self.serve(SourceCategory::RoutePolicies, |batch| &batch.route_policies)
            .await
    }

    async fn prefix_lists(&self) -> SourceResult<Vec<PrefixList>> {
        self.serve(SourceCategory::PrefixLists, |batch| &batch.prefix_lists)
            .await
    }

    async fn community_lists(&self) -> SourceResult<Vec<CommunityList>> {
        self.serve(SourceCategory::CommunityLists, |batch| &batch.community_lists)
            .await
    }

    async fn snmp(&self) -> SourceResult<Vec<SnmpConfig>> {
        self.serve(SourceCategory::Snmp, |batch| &batch.snmp).await
    }
}

/// Renders a tiny artifact per device, failing or panicking for chosen hosts.
#[derive(Default)]
pub(crate) struct ScriptedCompiler {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCompiler {
    pub(crate) fn failing_for(mut self, hostname: &str) -> Self {
        self.failing.insert(hostname.to_string());
        self
    }

    pub(crate) fn panicking_for(mut self, hostname: &str) -> Self {
        self.panicking.insert(hostname.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl DeviceCompiler for ScriptedCompiler {
    fn compile(&self, view: &DeviceView) -> Result<CompiledArtifact, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hostname = view.identity.as_str();
        assert!(!self.panicking.contains(hostname), "scripted panic for {hostname}");
        if self.failing.contains(hostname) {
            return Err(CompileError::Rejected {
                device: view.identity.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(CompiledArtifact {
            openconfig: json!({ "hostname": hostname, "sessions": view.sessions.len() }),
            ietf: json!({ "hostname": hostname }),
            afk_enabled: view.afk_enabled,
        })
    }
}
