//! Cascading deletion plans for dead chains.
//!
//! A plan lists every object of a chain in the order it should be removed:
//! the proxy first, so no new traffic can reach the rest; then the leaves
//! (certificates, backend services and their health checks); then the url
//! map; finally the forwarding rule, when the chain has one.
//!
//! Every task of a plan carries the same expiry. Workers discard tasks
//! delivered after that instant instead of executing them.

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::resource::ResourceRef;
use crate::time::Timestamp;
use crate::tree::ResolvedTree;

/// How long a plan stays executable after it was built.
pub const PLAN_TTL: Duration = Duration::minutes(15);

/// One queued deletion of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionTask {
    pub target: ResourceRef,
    pub expires_at: Timestamp,
}

impl DeletionTask {
    pub fn new(target: ResourceRef, expires_at: Timestamp) -> Self {
        Self { target, expires_at }
    }

    /// True once `now` is strictly past the expiry.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Builds the ordered deletion plan for a chain already classified dead.
pub fn plan_deletion(tree: &ResolvedTree, now: Timestamp) -> Vec<DeletionTask> {
    let expires_at = now.plus(PLAN_TTL);
    let mut targets: Vec<&ResourceRef> = Vec::new();

    let ordered = std::iter::once(&tree.proxy)
        .chain(tree.certificates.iter())
        .chain(
            tree.backend_services
                .iter()
                .flat_map(|bs| std::iter::once(&bs.service).chain(bs.health_checks.iter())),
        )
        .chain(std::iter::once(&tree.url_map))
        .chain(tree.forwarding_rule.iter());

    for target in ordered {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    targets
        .into_iter()
        .map(|target| DeletionTask::new(target.clone(), expires_at))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceKind, Scope};
    use crate::tree::{GroupMembership, ResolvedBackendService};
    use time::macros::datetime;

    fn dead_https_tree() -> ResolvedTree {
        ResolvedTree {
            forwarding_rule: Some(ResourceRef::global(
                ResourceKind::ForwardingRule,
                "k8s-fw-default-app",
            )),
            proxy: ResourceRef::global(ResourceKind::TargetHttpsProxy, "k8s-tps-default-app"),
            certificates: vec![ResourceRef::global(
                ResourceKind::SslCertificate,
                "k8s-ssl-default-app",
            )],
            url_map: ResourceRef::global(ResourceKind::UrlMap, "k8s-um-default-app"),
            backend_services: vec![ResolvedBackendService {
                service: ResourceRef::global(ResourceKind::BackendService, "k8s-be-30001"),
                health_checks: vec![ResourceRef::global(
                    ResourceKind::HealthCheck,
                    "k8s-be-30001",
                )],
                instance_groups: vec![GroupMembership::counted(
                    ResourceRef::new(
                        ResourceKind::InstanceGroup,
                        Scope::location("us-central1-a"),
                        "k8s-ig",
                    ),
                    0,
                )],
            }],
            created_at: Timestamp::new(datetime!(2024-01-01 09:00:00 UTC)),
        }
    }

    #[test]
    fn test_plan_order_and_shared_expiry() {
        let now = Timestamp::new(datetime!(2024-01-01 12:00:00 UTC));
        let plan = plan_deletion(&dead_https_tree(), now);

        let kinds: Vec<ResourceKind> = plan.iter().map(|t| t.target.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::TargetHttpsProxy,
                ResourceKind::SslCertificate,
                ResourceKind::BackendService,
                ResourceKind::HealthCheck,
                ResourceKind::UrlMap,
                ResourceKind::ForwardingRule,
            ]
        );

        let expected = Timestamp::new(datetime!(2024-01-01 12:15:00 UTC));
        assert!(plan.iter().all(|t| t.expires_at == expected));
        assert!(plan.iter().all(|t| t.target.kind.is_plannable()));
    }

    #[test]
    fn test_orphan_plan_has_no_forwarding_rule() {
        let mut tree = dead_https_tree();
        tree.forwarding_rule = None;
        let plan = plan_deletion(&tree, Timestamp::new(datetime!(2024-01-01 12:00:00 UTC)));
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.last().unwrap().target.kind, ResourceKind::UrlMap);
    }

    #[test]
    fn test_shared_health_check_emitted_once() {
        let mut tree = dead_https_tree();
        let mut second = tree.backend_services[0].clone();
        second.service = ResourceRef::global(ResourceKind::BackendService, "k8s-be-30002");
        tree.backend_services.push(second);

        let plan = plan_deletion(&tree, Timestamp::new(datetime!(2024-01-01 12:00:00 UTC)));
        let health_checks = plan
            .iter()
            .filter(|t| t.target.kind == ResourceKind::HealthCheck)
            .count();
        assert_eq!(health_checks, 1);
        assert_eq!(plan.len(), 7);
        // the url map still follows every leaf
        assert_eq!(plan[5].target.kind, ResourceKind::UrlMap);
    }

    #[test]
    fn test_expiry() {
        let expires_at = Timestamp::new(datetime!(2024-01-01 12:15:00 UTC));
        let task = DeletionTask::new(
            ResourceRef::global(ResourceKind::UrlMap, "k8s-um-default-app"),
            expires_at,
        );
        assert!(!task.is_expired(expires_at));
        assert!(task.is_expired(expires_at.plus(Duration::seconds(1))));
        assert!(!task.is_expired(expires_at.plus(-Duration::minutes(10))));
    }
}
