#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! netagg build service.
//!
//! Layout: `pipeline.rs` (fetch, index, compile), `scheduler.rs` (build loop),
//! `trigger.rs` (coalesced rebuild requests), `snapshot.rs` (published device
//! outcomes), `handles.rs` (read surface), `compiler.rs` (reference device
//! compiler), `http/` (read API), `bootstrap.rs` (service wiring).

pub mod bootstrap;
pub mod compiler;
pub mod error;
pub mod handles;
pub mod http;
pub mod pipeline;
pub mod scheduler;
pub mod snapshot;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use bootstrap::run_app;
pub use compiler::ReferenceCompiler;
pub use error::{AppError, AppResult};
pub use handles::BuildHandles;
pub use pipeline::{AbortReason, BuildError, BuildRun, Pipeline, PipelineSettings};
pub use scheduler::Scheduler;
pub use snapshot::{CompiledDevice, DeviceSnapshot, SnapshotStore};
pub use trigger::{BuildTrigger, TriggerReceiver, TriggerResponse, build_trigger};
