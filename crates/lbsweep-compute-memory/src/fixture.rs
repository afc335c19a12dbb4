//! Builders that install complete load-balancer chains the way the ingress
//! controller names them.

use lbsweep_core::{
    Backend, BackendService, ForwardingRule, GroupMember, PathMatcher, PathRule, ProxyProtocol,
    ResourceKind, ResourceRef, Scope, TargetProxy, Timestamp, UrlMap,
};

use crate::compute::InMemoryCompute;

/// Zone used for instance groups unless a backend says otherwise.
pub const DEFAULT_ZONE: &str = "us-central1-a";

#[derive(Debug, Clone)]
pub struct BackendFixture {
    name: String,
    zone: String,
    group_sizes: Vec<usize>,
    health_check: bool,
}

impl BackendFixture {
    /// A global backend service with one instance group per entry in `group_sizes`.
    pub fn new(name: impl Into<String>, group_sizes: &[usize]) -> Self {
        Self {
            name: name.into(),
            zone: DEFAULT_ZONE.to_string(),
            group_sizes: group_sizes.to_vec(),
            health_check: true,
        }
    }

    pub fn in_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn without_health_check(mut self) -> Self {
        self.health_check = false;
        self
    }
}

/// A forwarding rule (optional) → proxy → url map → backend services chain.
#[derive(Debug, Clone)]
pub struct ChainFixture {
    name: String,
    protocol: ProxyProtocol,
    created_at: Timestamp,
    forwarding_rule: Option<Scope>,
    backends: Vec<BackendFixture>,
    path_routed: bool,
}

/// References to everything a [`ChainFixture`] installed.
#[derive(Debug, Clone)]
pub struct InstalledChain {
    pub forwarding_rule: Option<ResourceRef>,
    pub proxy: ResourceRef,
    pub certificate: Option<ResourceRef>,
    pub url_map: ResourceRef,
    pub backend_services: Vec<ResourceRef>,
    pub health_checks: Vec<ResourceRef>,
    pub instance_groups: Vec<ResourceRef>,
}

impl ChainFixture {
    /// Chain named `k8s-*-{name}` with a global forwarding rule.
    pub fn new(name: impl Into<String>, protocol: ProxyProtocol, created_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            protocol,
            created_at,
            forwarding_rule: Some(Scope::Global),
            backends: Vec::new(),
            path_routed: false,
        }
    }

    /// Installs the chain without a forwarding rule.
    pub fn orphan(mut self) -> Self {
        self.forwarding_rule = None;
        self
    }

    pub fn regional_rule(mut self, region: impl Into<String>) -> Self {
        self.forwarding_rule = Some(Scope::location(region));
        self
    }

    pub fn backend(mut self, backend: BackendFixture) -> Self {
        self.backends.push(backend);
        self
    }

    /// Routes every backend after the first through a path rule instead of
    /// leaving it unreferenced by the url map default.
    pub fn path_routed(mut self) -> Self {
        self.path_routed = true;
        self
    }

    pub fn install(&self, compute: &InMemoryCompute) -> InstalledChain {
        let timestamp = self.created_at.to_string();
        let proxy_prefix = match self.protocol {
            ProxyProtocol::Http => "k8s-tp",
            ProxyProtocol::Https => "k8s-tps",
        };

        let mut backend_services = Vec::new();
        let mut health_checks = Vec::new();
        let mut instance_groups = Vec::new();
        for backend in &self.backends {
            let service = ResourceRef::global(ResourceKind::BackendService, backend.name.clone());
            let mut groups = Vec::new();
            for (i, size) in backend.group_sizes.iter().enumerate() {
                let group = ResourceRef::new(
                    ResourceKind::InstanceGroup,
                    Scope::location(backend.zone.clone()),
                    format!("{}-ig-{i}", backend.name),
                );
                let members = (0..*size)
                    .map(|n| GroupMember {
                        instance: format!("{}-node-{n}", group.name),
                        status: Some("RUNNING".to_string()),
                    })
                    .collect();
                compute.insert_instance_group(group.clone(), members);
                groups.push(Backend {
                    group: compute.self_link(&group),
                });
                instance_groups.push(group);
            }

            let mut links = Vec::new();
            if backend.health_check {
                let hc = ResourceRef::global(ResourceKind::HealthCheck, backend.name.clone());
                compute.insert_leaf(hc.clone());
                links.push(compute.self_link(&hc));
                health_checks.push(hc);
            }

            compute.insert_backend_service(
                service.clone(),
                BackendService {
                    name: backend.name.clone(),
                    backends: groups,
                    health_checks: links,
                    ..Default::default()
                },
            );
            backend_services.push(service);
        }

        let url_map = ResourceRef::global(ResourceKind::UrlMap, format!("k8s-um-{}", self.name));
        let service_links: Vec<String> = backend_services
            .iter()
            .map(|s| compute.self_link(s))
            .collect();
        let (default_service, path_matchers) = match service_links.split_first() {
            Some((first, rest)) if self.path_routed && !rest.is_empty() => (
                Some(first.clone()),
                vec![PathMatcher {
                    name: "host1".to_string(),
                    default_service: Some(first.clone()),
                    path_rules: rest
                        .iter()
                        .enumerate()
                        .map(|(i, link)| PathRule {
                            paths: vec![format!("/svc{i}/*")],
                            service: Some(link.clone()),
                        })
                        .collect(),
                }],
            ),
            Some((first, rest)) => (
                Some(first.clone()),
                rest.iter()
                    .enumerate()
                    .map(|(i, link)| PathMatcher {
                        name: format!("host{i}"),
                        default_service: Some(link.clone()),
                        path_rules: Vec::new(),
                    })
                    .collect(),
            ),
            None => (None, Vec::new()),
        };
        compute.insert_url_map(
            url_map.clone(),
            UrlMap {
                name: url_map.name.clone(),
                default_service,
                path_matchers,
                ..Default::default()
            },
        );

        let certificate = match self.protocol {
            ProxyProtocol::Https => {
                let cert = ResourceRef::global(
                    ResourceKind::SslCertificate,
                    format!("k8s-ssl-{}", self.name),
                );
                compute.insert_leaf(cert.clone());
                Some(cert)
            }
            ProxyProtocol::Http => None,
        };

        let proxy = ResourceRef::global(
            self.protocol.kind(),
            format!("{proxy_prefix}-{}", self.name),
        );
        compute.insert_target_proxy(
            proxy.clone(),
            TargetProxy {
                name: proxy.name.clone(),
                url_map: Some(compute.self_link(&url_map)),
                ssl_certificates: certificate
                    .iter()
                    .map(|c| compute.self_link(c))
                    .collect(),
                creation_timestamp: Some(timestamp.clone()),
                ..Default::default()
            },
        );

        let forwarding_rule = self.forwarding_rule.as_ref().map(|scope| {
            let rule = ResourceRef::new(
                ResourceKind::ForwardingRule,
                scope.clone(),
                format!("k8s-fw-{}", self.name),
            );
            compute.insert_forwarding_rule(
                rule.clone(),
                ForwardingRule {
                    name: rule.name.clone(),
                    target: Some(compute.self_link(&proxy)),
                    region: match scope {
                        Scope::Global => None,
                        Scope::Location(region) => Some(region.clone()),
                    },
                    creation_timestamp: Some(timestamp.clone()),
                    ..Default::default()
                },
            );
            rule
        });

        InstalledChain {
            forwarding_rule,
            proxy,
            certificate,
            url_map,
            backend_services,
            health_checks,
            instance_groups,
        }
    }
}
