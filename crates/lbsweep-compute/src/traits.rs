//! The Compute Engine surface the sweeper depends on.

use async_trait::async_trait;
use lbsweep_core::{
    BackendService, Firewall, ForwardingRule, GroupMember, Instance, ProxyProtocol, ResourceRef,
    TargetProxy, UrlMap, Zone,
};

use crate::error::ComputeError;

/// Read, list and delete operations over one project's Compute Engine resources.
///
/// Implementations must be thread-safe (`Send + Sync`). Every lookup of a
/// missing resource fails with [`ComputeError::NotFound`], including deletes.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Project the backend operates on.
    fn project_id(&self) -> &str;

    /// Every forwarding rule in the project, global and regional.
    async fn aggregated_forwarding_rules(&self) -> Result<Vec<ForwardingRule>, ComputeError>;

    async fn get_forwarding_rule(
        &self,
        rule: &ResourceRef,
    ) -> Result<ForwardingRule, ComputeError>;

    /// Every global target proxy of the given protocol.
    async fn list_target_proxies(
        &self,
        protocol: ProxyProtocol,
    ) -> Result<Vec<TargetProxy>, ComputeError>;

    async fn get_target_proxy(&self, proxy: &ResourceRef) -> Result<TargetProxy, ComputeError>;

    async fn get_url_map(&self, url_map: &ResourceRef) -> Result<UrlMap, ComputeError>;

    /// Fetches a backend service from the global or regional collection
    /// according to the reference's scope.
    async fn get_backend_service(
        &self,
        service: &ResourceRef,
    ) -> Result<BackendService, ComputeError>;

    /// Members of an instance group in every lifecycle state.
    async fn list_group_members(
        &self,
        group: &ResourceRef,
    ) -> Result<Vec<GroupMember>, ComputeError>;

    async fn list_firewalls(&self) -> Result<Vec<Firewall>, ComputeError>;

    async fn list_zones(&self) -> Result<Vec<Zone>, ComputeError>;

    async fn list_instances(&self, zone: &str) -> Result<Vec<Instance>, ComputeError>;

    /// Deletes one resource through the collection its kind and scope select.
    async fn delete(&self, target: &ResourceRef) -> Result<(), ComputeError>;
}
