#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Inventory side of the build pipeline.
//!
//! Layout:
//! - `model.rs`: records as served by the inventory API.
//! - `source.rs`: the [`AssetSource`] seam and [`SourceError`].
//! - `batch.rs`: [`AssetBatch`], one run's fetched collections.
//! - `index.rs`: per-device grouping ([`AssetIndex`], [`DeviceView`]).
//! - `compiler.rs`: the [`DeviceCompiler`] seam and [`CompiledArtifact`].
//! - `netbox.rs`: HTTP implementation of [`AssetSource`].

pub mod batch;
pub mod compiler;
pub mod identity;
pub mod index;
pub mod model;
pub mod netbox;
pub mod source;

pub use batch::AssetBatch;
pub use compiler::{CompileError, CompiledArtifact, DeviceCompiler};
pub use identity::DeviceIdentity;
pub use index::{AFK_ENABLED_TAG, AssetIndex, DeviceView, MissingDeviceData};
pub use model::{
    AfiSafi, AfiSafiName, Asn, BgpGlobal, BgpSession, CommunityList, CommunityListTerm, Decision,
    DeviceRecord, DeviceRef, IpVersion, NamedRef, NetworkDevice, PeerAddress, PeerGroup,
    PrefixList, PrefixListTerm, RoutePolicy, RoutePolicyTerm, SessionEndpoint, SessionStatus,
    SnmpCommunity, SnmpConfig, Tag,
};
pub use netagg_config::SourceCategory;
pub use netbox::NetboxSource;
pub use source::{AssetSource, FetchedAssets, SourceError, SourceResult};
