//! # lbsweep-compute
//!
//! The Compute Engine seam of lbsweep.
//!
//! [`ComputeApi`] is the contract every backend implements: list, get and
//! delete over the load-balancer, instance-group, firewall, zone and instance
//! collections of one project. [`ComputeClient`] implements it against the
//! Compute Engine v1 REST API; an in-memory backend lives in
//! `lbsweep-compute-memory`.
//!
//! ```ignore
//! use lbsweep_compute::{ComputeApi, ComputeClient, ComputeClientConfig, GcpTokenSource};
//!
//! let tokens = GcpTokenSource::discover().await?;
//! let client = ComputeClient::new(ComputeClientConfig::new("my-project"), Arc::new(tokens))?;
//! let rules = client.aggregated_forwarding_rules().await?;
//! ```

mod error;
mod rest;
mod token;
mod traits;

pub use error::ComputeError;
pub use rest::{ComputeClient, ComputeClientConfig, DEFAULT_ENDPOINT};
pub use token::{
    CLOUD_PLATFORM_SCOPE, COMPUTE_SCOPE, DynTokenSource, GcpTokenSource, StaticToken,
    TokenSource,
};
pub use traits::ComputeApi;

/// Type alias for a compute result.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Shared handle to a compute backend.
pub type DynCompute = std::sync::Arc<dyn ComputeApi>;
