//! Resource graph resolution.
//!
//! Enumerates candidate chain roots (controller forwarding rules and orphan
//! proxies) and walks one root down to instance-group membership.

use std::collections::HashSet;

use lbsweep_compute::{ComputeError, DynCompute};
use lbsweep_core::{
    Candidate, CoreError, GroupMembership, ProxyProtocol, ResolvedBackendService, ResolvedTree,
    ResourceKind, ResourceRef, health_check_kind, target_proxy_kind,
};
use serde::Serialize;

use crate::error::ResolveError;

/// Controller forwarding rules, split by the protocol of the proxy they target.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateListing {
    pub http: Vec<Candidate>,
    pub https: Vec<Candidate>,
    /// Prefixed rules whose target is not an HTTP(S) proxy, e.g. target pools.
    pub skipped: usize,
}

impl CandidateListing {
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.http.iter().chain(self.https.iter())
    }

    pub fn len(&self) -> usize {
        self.http.len() + self.https.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Proxies reachable from some forwarding rule.
    pub fn seen_proxies(&self) -> HashSet<ResourceRef> {
        self.candidates().map(|c| c.proxy.clone()).collect()
    }
}

/// Result of scanning for proxies no forwarding rule points at.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanScan {
    pub candidates: Vec<Candidate>,
    /// Protocols whose proxy listing failed and were not scanned.
    pub failed_protocols: Vec<ProxyProtocol>,
}

/// Lists every forwarding rule whose name starts with `prefix` and targets a proxy.
pub async fn list_candidate_forwarding_rules(
    compute: &DynCompute,
    prefix: &str,
) -> Result<CandidateListing, ComputeError> {
    let rules = compute.aggregated_forwarding_rules().await?;
    let mut listing = CandidateListing::default();

    for rule in rules.iter().filter(|r| r.name.starts_with(prefix)) {
        let Some(target) = rule.target.as_deref() else {
            listing.skipped += 1;
            continue;
        };
        let Some(kind) = target_proxy_kind(target) else {
            tracing::debug!(rule = %rule.name, target, "forwarding rule does not target a proxy");
            listing.skipped += 1;
            continue;
        };

        let parsed = rule
            .reference()
            .and_then(|r| ResourceRef::from_self_link(kind, target).map(|p| (r, p)));
        let (rule_ref, proxy_ref) = match parsed {
            Ok(refs) => refs,
            Err(e) => {
                tracing::warn!(
                    rule = %rule.name,
                    error = %e,
                    "skipping unparseable forwarding rule"
                );
                listing.skipped += 1;
                continue;
            }
        };

        let candidate = Candidate::forwarding_rule(rule_ref, proxy_ref);
        match kind {
            ResourceKind::TargetHttpsProxy => listing.https.push(candidate),
            _ => listing.http.push(candidate),
        }
    }

    tracing::info!(
        http = listing.http.len(),
        https = listing.https.len(),
        skipped = listing.skipped,
        "listed candidate forwarding rules"
    );
    Ok(listing)
}

/// Lists every proxy whose name starts with `prefix` and is absent from `seen`.
///
/// A failure listing one protocol's proxies is logged and only skips that protocol.
pub async fn list_orphan_proxies(
    compute: &DynCompute,
    prefix: &str,
    seen: &HashSet<ResourceRef>,
) -> OrphanScan {
    let mut scan = OrphanScan::default();

    for protocol in [ProxyProtocol::Http, ProxyProtocol::Https] {
        let proxies = match compute.list_target_proxies(protocol).await {
            Ok(proxies) => proxies,
            Err(e) => {
                tracing::error!(?protocol, error = %e, "failed to list target proxies");
                scan.failed_protocols.push(protocol);
                continue;
            }
        };

        for proxy in proxies.iter().filter(|p| p.name.starts_with(prefix)) {
            let proxy_ref = match ResourceRef::from_self_link(protocol.kind(), &proxy.self_link) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(proxy = %proxy.name, error = %e, "skipping unparseable proxy");
                    continue;
                }
            };
            if !seen.contains(&proxy_ref) {
                scan.candidates.push(Candidate::orphan(proxy_ref));
            }
        }
    }

    tracing::info!(orphans = scan.candidates.len(), "scanned for orphan proxies");
    scan
}

/// Walks a candidate's chain: proxy, url map, backend services, instance groups.
///
/// NotFound on any structural link fails the whole resolution. Membership
/// lookups are best effort; a failed lookup counts as zero and is flagged.
pub async fn resolve_chain(
    compute: &DynCompute,
    candidate: &Candidate,
) -> Result<ResolvedTree, ResolveError> {
    let proxy = compute.get_target_proxy(&candidate.proxy).await?;
    let mut created_at = proxy.created_at()?;

    if let Some(rule_ref) = &candidate.forwarding_rule {
        let rule = compute.get_forwarding_rule(rule_ref).await?;
        created_at = created_at.max(rule.created_at()?);
    }

    let certificates = proxy
        .ssl_certificates
        .iter()
        .filter_map(|link| {
            ResourceRef::from_self_link(ResourceKind::SslCertificate, link)
                .inspect_err(|e| {
                    tracing::warn!(proxy = %candidate.proxy, error = %e, "skipping certificate")
                })
                .ok()
        })
        .collect();

    let url_map_link = proxy
        .url_map
        .as_deref()
        .ok_or_else(|| CoreError::missing_field(candidate.proxy.to_string(), "urlMap"))?;
    let url_map_ref = ResourceRef::from_self_link(ResourceKind::UrlMap, url_map_link)?;
    let url_map = compute.get_url_map(&url_map_ref).await?;

    let mut backend_services = Vec::new();
    for link in url_map.backend_service_links() {
        let service_ref = ResourceRef::from_self_link(ResourceKind::BackendService, link)?;
        backend_services.push(resolve_backend_service(compute, service_ref).await?);
    }

    let tree = ResolvedTree {
        forwarding_rule: candidate.forwarding_rule.clone(),
        proxy: candidate.proxy.clone(),
        certificates,
        url_map: url_map_ref,
        backend_services,
        created_at,
    };

    tracing::debug!(
        candidate = %candidate,
        backend_services = tree.backend_services.len(),
        instances = tree.total_instances(),
        failed_lookups = tree.failed_lookups(),
        "resolved chain"
    );
    Ok(tree)
}

async fn resolve_backend_service(
    compute: &DynCompute,
    service_ref: ResourceRef,
) -> Result<ResolvedBackendService, ResolveError> {
    let service = compute.get_backend_service(&service_ref).await?;

    let health_checks = service
        .health_checks
        .iter()
        .filter_map(|link| {
            let parsed = health_check_kind(link)
                .ok_or_else(|| {
                    CoreError::invalid_self_link(link, "unknown health check collection")
                })
                .and_then(|kind| ResourceRef::from_self_link(kind, link));
            parsed
                .inspect_err(|e| {
                    tracing::warn!(service = %service_ref, error = %e, "skipping health check")
                })
                .ok()
        })
        .collect();

    let mut instance_groups = Vec::with_capacity(service.backends.len());
    for backend in &service.backends {
        let group = ResourceRef::from_self_link(ResourceKind::InstanceGroup, &backend.group)?;
        match compute.list_group_members(&group).await {
            Ok(members) => instance_groups.push(GroupMembership::counted(group, members.len())),
            Err(e) => {
                tracing::warn!(
                    group = %group,
                    error = %e,
                    "instance group lookup failed; counting zero members"
                );
                instance_groups.push(GroupMembership::failed(group));
            }
        }
    }

    Ok(ResolvedBackendService {
        service: service_ref,
        health_checks,
        instance_groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbsweep_compute::ComputeApi;
    use lbsweep_compute_memory::{BackendFixture, ChainFixture, InMemoryCompute, Operation};
    use lbsweep_core::{ForwardingRule, Scope, Timestamp};
    use std::sync::Arc;
    use time::macros::datetime;

    fn created() -> Timestamp {
        Timestamp::new(datetime!(2024-01-01 09:00:00 UTC))
    }

    fn setup() -> (Arc<InMemoryCompute>, DynCompute) {
        let memory = Arc::new(InMemoryCompute::new("p"));
        let compute: DynCompute = memory.clone();
        (memory, compute)
    }

    #[tokio::test]
    async fn test_listing_partitions_and_skips() {
        let (memory, compute) = setup();
        ChainFixture::new("a", ProxyProtocol::Http, created())
            .backend(BackendFixture::new("k8s-be-1", &[1]))
            .install(&memory);
        ChainFixture::new("b", ProxyProtocol::Https, created())
            .regional_rule("us-east1")
            .backend(BackendFixture::new("k8s-be-2", &[1]))
            .install(&memory);
        memory.insert_forwarding_rule(
            ResourceRef::new(
                ResourceKind::ForwardingRule,
                Scope::location("us-east1"),
                "k8s-fw-pool",
            ),
            ForwardingRule {
                name: "k8s-fw-pool".into(),
                target: Some("https://x/regions/us-east1/targetPools/pool".into()),
                ..Default::default()
            },
        );
        memory.insert_forwarding_rule(
            ResourceRef::global(ResourceKind::ForwardingRule, "manual-lb"),
            ForwardingRule {
                name: "manual-lb".into(),
                target: Some("https://x/global/targetHttpProxies/manual".into()),
                ..Default::default()
            },
        );

        let listing = list_candidate_forwarding_rules(&compute, "k8s-fw").await.unwrap();
        assert_eq!(listing.http.len(), 1);
        assert_eq!(listing.https.len(), 1);
        assert_eq!(listing.skipped, 1);
        let https = &listing.https[0];
        assert_eq!(
            https.forwarding_rule.as_ref().unwrap().scope,
            Scope::location("us-east1")
        );
        assert_eq!(https.proxy.kind, ResourceKind::TargetHttpsProxy);
    }

    #[tokio::test]
    async fn test_orphans_exclude_seen_proxies() {
        let (memory, compute) = setup();
        let referenced = ChainFixture::new("a", ProxyProtocol::Http, created())
            .backend(BackendFixture::new("k8s-be-1", &[1]))
            .install(&memory);
        let orphan = ChainFixture::new("b", ProxyProtocol::Https, created())
            .orphan()
            .backend(BackendFixture::new("k8s-be-2", &[0]))
            .install(&memory);

        let seen: HashSet<_> = [referenced.proxy.clone()].into_iter().collect();
        let scan = list_orphan_proxies(&compute, "k8s-tp", &seen).await;
        assert_eq!(scan.candidates, vec![Candidate::orphan(orphan.proxy)]);
        assert!(scan.failed_protocols.is_empty());
    }

    #[tokio::test]
    async fn test_orphan_scan_survives_one_protocol_failing() {
        let (memory, compute) = setup();
        let orphan = ChainFixture::new("b", ProxyProtocol::Https, created())
            .orphan()
            .install(&memory);
        memory.fail_for(Operation::ListTargetProxies, "global/targetHttpProxies", 500);

        let scan = list_orphan_proxies(&compute, "k8s-tp", &HashSet::new()).await;
        assert_eq!(scan.failed_protocols, vec![ProxyProtocol::Http]);
        assert_eq!(scan.candidates, vec![Candidate::orphan(orphan.proxy)]);
    }

    #[tokio::test]
    async fn test_resolve_counts_members_and_collects_leaves() {
        let (memory, compute) = setup();
        let chain = ChainFixture::new("app", ProxyProtocol::Https, created())
            .backend(BackendFixture::new("k8s-be-1", &[0, 2]))
            .backend(BackendFixture::new("k8s-be-2", &[1]).without_health_check())
            .path_routed()
            .install(&memory);
        let candidate =
            Candidate::forwarding_rule(chain.forwarding_rule.clone().unwrap(), chain.proxy.clone());

        let tree = resolve_chain(&compute, &candidate).await.unwrap();
        assert_eq!(tree.certificates, vec![chain.certificate.clone().unwrap()]);
        assert_eq!(tree.url_map, chain.url_map);
        assert_eq!(tree.backend_services.len(), 2);
        assert_eq!(tree.backend_services[0].health_checks, chain.health_checks);
        assert!(tree.backend_services[1].health_checks.is_empty());
        assert_eq!(tree.total_instances(), 3);
        assert_eq!(tree.created_at, created());
    }

    #[tokio::test]
    async fn test_membership_is_listed_in_the_group_zone() {
        let (memory, compute) = setup();
        let chain = ChainFixture::new("app", ProxyProtocol::Http, created())
            .orphan()
            .backend(BackendFixture::new("k8s-be-1", &[2]).in_zone("europe-west1-b"))
            .install(&memory);

        let tree = resolve_chain(&compute, &Candidate::orphan(chain.proxy))
            .await
            .unwrap();
        let group = &tree.backend_services[0].instance_groups[0];
        assert_eq!(group.group.scope, Scope::location("europe-west1-b"));
        assert_eq!(group.instances, 2);

        let listed: Vec<_> = memory
            .calls()
            .into_iter()
            .filter(|c| c.operation == Operation::ListGroupMembers)
            .map(|c| c.target)
            .collect();
        assert_eq!(
            listed,
            vec!["zones/europe-west1-b/instanceGroups/k8s-be-1-ig-0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_resolve_not_found_on_structural_link() {
        let (memory, compute) = setup();
        let chain = ChainFixture::new("app", ProxyProtocol::Http, created())
            .orphan()
            .backend(BackendFixture::new("k8s-be-1", &[0]))
            .install(&memory);
        memory.fail_for(Operation::GetUrlMap, chain.url_map.api_path(), 404);

        let err = resolve_chain(&compute, &Candidate::orphan(chain.proxy))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_membership_failure_counts_zero() {
        let (memory, compute) = setup();
        let chain = ChainFixture::new("app", ProxyProtocol::Http, created())
            .orphan()
            .backend(BackendFixture::new("k8s-be-1", &[3]))
            .install(&memory);
        memory.fail_for(
            Operation::ListGroupMembers,
            chain.instance_groups[0].api_path(),
            503,
        );

        let tree = resolve_chain(&compute, &Candidate::orphan(chain.proxy))
            .await
            .unwrap();
        assert_eq!(tree.total_instances(), 0);
        assert_eq!(tree.failed_lookups(), 1);
    }

    #[tokio::test]
    async fn test_missing_timestamp_is_resolution_error() {
        let (memory, compute) = setup();
        let chain = ChainFixture::new("app", ProxyProtocol::Http, created())
            .orphan()
            .install(&memory);
        let mut proxy = memory.get_target_proxy(&chain.proxy).await.unwrap();
        proxy.creation_timestamp = None;
        memory.insert_target_proxy(chain.proxy.clone(), proxy);

        let err = resolve_chain(&compute, &Candidate::orphan(chain.proxy))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)));
    }
}
