//! Device Snapshot Store: the published device to artifact mapping.
//!
//! A [`DeviceSnapshot`] is immutable once built. The [`SnapshotStore`] swaps
//! whole snapshots behind an `Arc`, so readers holding a snapshot never see it
//! change and never observe a mix of two builds.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use netagg_inventory::{CompiledArtifact, DeviceIdentity};
use tracing::info;

/// Outcome of one device in a build.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledDevice {
    /// Compiled artifact.
    Built(Arc<CompiledArtifact>),
    /// The device is known but could not be built.
    Failed {
        /// Why the build failed.
        reason: String,
    },
}

impl CompiledDevice {
    /// Failure marker with `reason`.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Artifact, when the device was built.
    #[must_use]
    pub const fn artifact(&self) -> Option<&Arc<CompiledArtifact>> {
        match self {
            Self::Built(artifact) => Some(artifact),
            Self::Failed { .. } => None,
        }
    }

    /// Whether the device was built.
    #[must_use]
    pub const fn is_built(&self) -> bool {
        matches!(self, Self::Built(_))
    }
}

/// What is currently served: every device of one build and its outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    devices: BTreeMap<DeviceIdentity, CompiledDevice>,
}

impl DeviceSnapshot {
    /// Empty snapshot, served until the first build publishes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Outcome for `hostname`.
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<&CompiledDevice> {
        self.devices.get(hostname)
    }

    /// Devices in hostname order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceIdentity, &CompiledDevice)> {
        self.devices.iter()
    }

    /// Number of devices, built or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the snapshot has no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of built devices.
    #[must_use]
    pub fn built_count(&self) -> usize {
        self.devices.values().filter(|device| device.is_built()).count()
    }

    /// Devices carrying a failure marker.
    #[must_use]
    pub fn failed_devices(&self) -> Vec<&DeviceIdentity> {
        self.devices
            .iter()
            .filter(|(_, device)| !device.is_built())
            .map(|(identity, _)| identity)
            .collect()
    }
}

impl FromIterator<(DeviceIdentity, CompiledDevice)> for DeviceSnapshot {
    fn from_iter<I: IntoIterator<Item = (DeviceIdentity, CompiledDevice)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

/// Holder of the live snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    live: RwLock<Arc<DeviceSnapshot>>,
}

impl SnapshotStore {
    /// Store serving an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live snapshot.
    pub fn publish(&self, snapshot: DeviceSnapshot) {
        let snapshot = Arc::new(snapshot);
        info!(
            devices = snapshot.len(),
            built = snapshot.built_count(),
            "device snapshot published"
        );
        *self.live.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Outcome for `hostname` in the live snapshot.
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<CompiledDevice> {
        self.get_all().get(hostname).cloned()
    }

    /// The live snapshot. Later publishes do not affect the returned value.
    #[must_use]
    pub fn get_all(&self) -> Arc<DeviceSnapshot> {
        Arc::clone(&self.live.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(name: &str) -> CompiledDevice {
        CompiledDevice::Built(Arc::new(CompiledArtifact {
            openconfig: json!({"hostname": name}),
            ietf: json!({}),
            afk_enabled: false,
        }))
    }

    #[test]
    fn store_starts_empty_and_swaps_wholesale() {
        let store = SnapshotStore::new();
        assert!(store.get_all().is_empty());
        assert!(store.get("a").is_none());

        store.publish(
            [
                (DeviceIdentity::new("a"), artifact("a")),
                (DeviceIdentity::new("b"), CompiledDevice::failed("no BGP sessions found for b")),
            ]
            .into_iter()
            .collect(),
        );
        let first = store.get_all();
        assert_eq!(first.built_count(), 1);
        assert_eq!(first.failed_devices(), vec![&DeviceIdentity::new("b")]);

        store.publish([(DeviceIdentity::new("c"), artifact("c"))].into_iter().collect());
        assert_eq!(first.len(), 2);
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some_and(|device| device.is_built()));
    }

    #[test]
    fn readers_during_concurrent_publishes_see_whole_snapshots() {
        let store = Arc::new(SnapshotStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for round in 0..200 {
                    let label = format!("round-{round}");
                    store.publish(
                        ["x", "y", "z"]
                            .into_iter()
                            .map(|host| (DeviceIdentity::new(host), artifact(&label)))
                            .collect(),
                    );
                }
            })
        };

        for _ in 0..200 {
            let snapshot = store.get_all();
            let labels = snapshot
                .iter()
                .filter_map(|(_, device)| device.artifact())
                .map(|artifact| artifact.openconfig["hostname"].clone())
                .collect::<Vec<_>>();
            assert!(labels.windows(2).all(|pair| pair[0] == pair[1]));
        }
        assert!(writer.join().is_ok());
    }
}
