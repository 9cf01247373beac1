//! Read API over [`BuildHandles`](crate::BuildHandles).
//!
//! Layout: `routes.rs` (route table and layers), `health.rs` (liveness, readiness,
//! version, metrics), `devices.rs` (compiled documents), `reports.rs` (build
//! reports and the rebuild trigger), `errors.rs` (JSON error bodies).

mod devices;
mod errors;
mod health;
mod reports;
mod routes;

pub use routes::router;
