//! Materialized load-balancer chain produced by the resolver.

use serde::{Deserialize, Serialize};

use crate::resource::ResourceRef;
use crate::time::Timestamp;

/// Fully dereferenced chain rooted at one target proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTree {
    /// Forwarding rule pointing at the proxy; absent for orphan proxies.
    pub forwarding_rule: Option<ResourceRef>,
    pub proxy: ResourceRef,
    /// Certificates attached to an HTTPS proxy.
    pub certificates: Vec<ResourceRef>,
    pub url_map: ResourceRef,
    pub backend_services: Vec<ResolvedBackendService>,
    /// Newest creation time among the root objects (proxy, forwarding rule).
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBackendService {
    pub service: ResourceRef,
    pub health_checks: Vec<ResourceRef>,
    pub instance_groups: Vec<GroupMembership>,
}

/// Membership of one instance group, counted across every lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group: ResourceRef,
    pub instances: usize,
    /// The membership lookup failed and `instances` was recorded as zero.
    #[serde(default)]
    pub lookup_failed: bool,
}

impl GroupMembership {
    pub fn counted(group: ResourceRef, instances: usize) -> Self {
        Self {
            group,
            instances,
            lookup_failed: false,
        }
    }

    pub fn failed(group: ResourceRef) -> Self {
        Self {
            group,
            instances: 0,
            lookup_failed: true,
        }
    }
}

impl ResolvedBackendService {
    pub fn instance_count(&self) -> usize {
        self.instance_groups.iter().map(|g| g.instances).sum()
    }
}

impl ResolvedTree {
    /// Instances across every group of every backend service.
    pub fn total_instances(&self) -> usize {
        self.backend_services
            .iter()
            .map(ResolvedBackendService::instance_count)
            .sum()
    }

    /// Number of membership lookups that degraded to zero.
    pub fn failed_lookups(&self) -> usize {
        self.backend_services
            .iter()
            .flat_map(|bs| bs.instance_groups.iter())
            .filter(|g| g.lookup_failed)
            .count()
    }
}
