//! Passes over the project's load-balancer resources.
//!
//! - Resolver: lists chain roots and walks one root down to its instance groups
//! - Check pass: enqueues an evaluate job for every chain root
//! - Firewalls: deletes node-pool firewall rules whose tags no instance carries

mod firewalls;
mod resolver;
mod sweep;

pub use firewalls::{FirewallReport, reconcile_firewalls};
pub use resolver::{
    CandidateListing, OrphanScan, list_candidate_forwarding_rules, list_orphan_proxies,
    resolve_chain,
};
pub use sweep::{CheckReport, run_check_pass};
