//! Dead/alive classification of a resolved chain.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::time::Timestamp;
use crate::tree::ResolvedTree;

/// Resources younger than this are never classified dead.
pub const GRACE_WINDOW: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    Dead,
}

impl Liveness {
    pub fn is_dead(&self) -> bool {
        matches!(self, Self::Dead)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a chain created at `created_at` as of `now`.
///
/// Inside the grace window the chain is alive regardless of membership.
/// Afterwards it is dead exactly when no instance group reachable from the
/// url map has any member.
pub fn classify(tree: &ResolvedTree, created_at: Timestamp, now: Timestamp) -> Liveness {
    if created_at.age_at(now) < GRACE_WINDOW {
        return Liveness::Alive;
    }

    if tree.total_instances() == 0 {
        Liveness::Dead
    } else {
        Liveness::Alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceKind, ResourceRef};
    use crate::tree::{GroupMembership, ResolvedBackendService};
    use time::macros::datetime;

    fn backend(name: &str, instances: &[usize]) -> ResolvedBackendService {
        ResolvedBackendService {
            service: ResourceRef::global(ResourceKind::BackendService, name),
            health_checks: vec![],
            instance_groups: instances
                .iter()
                .enumerate()
                .map(|(i, n)| {
                    GroupMembership::counted(
                        ResourceRef::new(
                            ResourceKind::InstanceGroup,
                            "us-central1-a".into(),
                            format!("{name}-ig-{i}"),
                        ),
                        *n,
                    )
                })
                .collect(),
        }
    }

    fn tree(services: Vec<ResolvedBackendService>) -> ResolvedTree {
        ResolvedTree {
            forwarding_rule: None,
            proxy: ResourceRef::global(ResourceKind::TargetHttpProxy, "k8s-tp-default-app"),
            certificates: vec![],
            url_map: ResourceRef::global(ResourceKind::UrlMap, "k8s-um-default-app"),
            backend_services: services,
            created_at: Timestamp::new(datetime!(2024-01-01 00:00:00 UTC)),
        }
    }

    fn now() -> Timestamp {
        Timestamp::new(datetime!(2024-01-01 12:00:00 UTC))
    }

    #[test]
    fn test_grace_window_keeps_young_chain_alive() {
        let t = tree(vec![backend("k8s-be-1", &[0])]);
        let created = now().plus(-Duration::minutes(30));
        assert_eq!(classify(&t, created, now()), Liveness::Alive);
    }

    #[test]
    fn test_old_empty_chain_is_dead() {
        let t = tree(vec![backend("k8s-be-1", &[0])]);
        let created = now().plus(-Duration::hours(2));
        assert_eq!(classify(&t, created, now()), Liveness::Dead);
    }

    #[test]
    fn test_grace_window_boundary() {
        let t = tree(vec![backend("k8s-be-1", &[0])]);
        let exactly_an_hour = now().plus(-GRACE_WINDOW);
        assert_eq!(classify(&t, exactly_an_hour, now()), Liveness::Dead);
        let just_under = now().plus(-GRACE_WINDOW + Duration::seconds(1));
        assert_eq!(classify(&t, just_under, now()), Liveness::Alive);
    }

    #[test]
    fn test_one_live_backend_keeps_chain_alive() {
        let t = tree(vec![backend("k8s-be-1", &[1]), backend("k8s-be-2", &[0])]);
        let created = now().plus(-Duration::hours(3));
        assert_eq!(classify(&t, created, now()), Liveness::Alive);
    }

    #[test]
    fn test_no_backend_services_is_dead() {
        let t = tree(vec![]);
        let created = now().plus(-Duration::hours(3));
        assert_eq!(classify(&t, created, now()), Liveness::Dead);
    }

    #[test]
    fn test_creation_in_future_is_alive() {
        let t = tree(vec![backend("k8s-be-1", &[0])]);
        let created = now().plus(Duration::minutes(5));
        assert_eq!(classify(&t, created, now()), Liveness::Alive);
    }

    #[test]
    fn test_deterministic() {
        let t = tree(vec![backend("k8s-be-1", &[0, 0])]);
        let created = now().plus(-Duration::hours(2));
        let first = classify(&t, created, now());
        for _ in 0..10 {
            assert_eq!(classify(&t, created, now()), first);
        }
    }
}
