//! In-memory Compute Engine backend for lbsweep.
//!
//! [`InMemoryCompute`] implements `ComputeApi` over a mutex-guarded map of
//! API-shaped models. It records every call and supports failure injection,
//! which makes it the backend of choice for tests and local dry runs.
//! [`ChainFixture`] installs whole load-balancer chains in one step.
//!
//! ```ignore
//! use lbsweep_compute_memory::{BackendFixture, ChainFixture, InMemoryCompute};
//!
//! let compute = InMemoryCompute::new("my-project");
//! let chain = ChainFixture::new("default-app", ProxyProtocol::Https, created_at)
//!     .backend(BackendFixture::new("k8s-be-30001", &[0]))
//!     .install(&compute);
//! ```

mod compute;
pub mod fixture;

pub use compute::{Call, InMemoryCompute, Operation};
pub use fixture::{BackendFixture, ChainFixture, DEFAULT_ZONE, InstalledChain};

/// Creates a shareable in-memory compute backend.
pub fn create_compute(project_id: impl Into<String>) -> std::sync::Arc<InMemoryCompute> {
    std::sync::Arc::new(InMemoryCompute::new(project_id))
}
