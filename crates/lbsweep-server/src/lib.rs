//! # lbsweep-server
//!
//! HTTP service that garbage-collects load-balancer chains the GKE ingress
//! controller left behind.
//!
//! A scheduler hits `/job/forwarding-rules/check`, which enqueues one
//! evaluate job per chain root. Each evaluation resolves the chain down to its
//! instance groups and, when nothing serves behind it, enqueues one delete job
//! per resource. Delete jobs carry a shared expiry so a stale plan is dropped
//! instead of tearing down a chain that came back. `/job/firewall-rules/check`
//! independently removes node-pool firewall rules whose tags no instance
//! carries.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod observability;
pub mod reconcile;
pub mod server;
pub mod worker;

pub use config::{AppConfig, QueueBackend, QueueConfig, ServerConfig, SweepConfig};
pub use dispatch::{DynQueue, InMemoryQueue, WorkQueue};
pub use error::{ApiError, FirewallError, QueueError, ResolveError};
pub use observability::init_tracing;
pub use server::{AppState, LbsweepServer, ServerBuilder, build_app};
pub use worker::{JobOutcome, JobRunner};
