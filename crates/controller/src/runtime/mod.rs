//! # Runtime
//!
//! Process-level plumbing shared by every controller.
//!
//! ## Module Structure
//!
//! - `initialization.rs` - rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop.rs` - Drives a `Reconciler` from a Kubernetes work queue
//! - `error_policy.rs` - Per-resource Fibonacci backoff and stream error handling
//! - `server.rs` - `/metrics`, `/healthz` and `/readyz`

pub mod error_policy;
pub mod initialization;
pub mod server;
pub mod watch_loop;

pub use initialization::{InitializationResult, initialize};
pub use server::ServerState;
pub use watch_loop::run_controller;
