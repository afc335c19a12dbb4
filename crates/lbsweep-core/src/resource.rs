//! Typed references to Compute Engine resources and self-link parsing.
//!
//! Every object the sweeper touches is addressed by a [`ResourceRef`]: its kind
//! (which fixes the API collection), its scope (`global` or a region/zone) and
//! its name. References are recovered from the self links embedded in API
//! responses by [`parse_self_link`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Closed set of resource kinds the sweeper reads or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ForwardingRule,
    TargetHttpProxy,
    TargetHttpsProxy,
    UrlMap,
    BackendService,
    HealthCheck,
    HttpHealthCheck,
    HttpsHealthCheck,
    SslCertificate,
    InstanceGroup,
    Firewall,
}

/// Whether a non-global scope names a region or a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Regional,
    Zonal,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::ForwardingRule,
        ResourceKind::TargetHttpProxy,
        ResourceKind::TargetHttpsProxy,
        ResourceKind::UrlMap,
        ResourceKind::BackendService,
        ResourceKind::HealthCheck,
        ResourceKind::HttpHealthCheck,
        ResourceKind::HttpsHealthCheck,
        ResourceKind::SslCertificate,
        ResourceKind::InstanceGroup,
        ResourceKind::Firewall,
    ];

    /// Collection keyword used in API paths and self links.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::ForwardingRule => "forwardingRules",
            Self::TargetHttpProxy => "targetHttpProxies",
            Self::TargetHttpsProxy => "targetHttpsProxies",
            Self::UrlMap => "urlMaps",
            Self::BackendService => "backendServices",
            Self::HealthCheck => "healthChecks",
            Self::HttpHealthCheck => "httpHealthChecks",
            Self::HttpsHealthCheck => "httpsHealthChecks",
            Self::SslCertificate => "sslCertificates",
            Self::InstanceGroup => "instanceGroups",
            Self::Firewall => "firewalls",
        }
    }

    pub fn locality(&self) -> Locality {
        match self {
            Self::InstanceGroup => Locality::Zonal,
            _ => Locality::Regional,
        }
    }

    pub fn is_target_proxy(&self) -> bool {
        matches!(self, Self::TargetHttpProxy | Self::TargetHttpsProxy)
    }

    pub fn is_health_check(&self) -> bool {
        matches!(
            self,
            Self::HealthCheck | Self::HttpHealthCheck | Self::HttpsHealthCheck
        )
    }

    /// Kinds a deletion plan may contain. Instance groups belong to the node
    /// pool and firewall rules to their own pass.
    pub fn is_plannable(&self) -> bool {
        !matches!(self, Self::InstanceGroup | Self::Firewall)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForwardingRule => "forwarding_rule",
            Self::TargetHttpProxy => "target_http_proxy",
            Self::TargetHttpsProxy => "target_https_proxy",
            Self::UrlMap => "url_map",
            Self::BackendService => "backend_service",
            Self::HealthCheck => "health_check",
            Self::HttpHealthCheck => "http_health_check",
            Self::HttpsHealthCheck => "https_health_check",
            Self::SslCertificate => "ssl_certificate",
            Self::InstanceGroup => "instance_group",
            Self::Firewall => "firewall",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource lives: the literal `global`, or a named region/zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Location(String),
}

impl Scope {
    pub fn location(name: impl Into<String>) -> Self {
        Self::Location(name.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Location(name) => name,
        }
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        if value == "global" {
            Self::Global
        } else {
            Self::Location(value.to_string())
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(serde::de::Error::custom("scope must not be empty"));
        }
        Ok(Scope::from(s.as_str()))
    }
}

/// A fully qualified reference to one resource within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub scope: Scope,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            name: name.into(),
        }
    }

    pub fn global(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::new(kind, Scope::Global, name)
    }

    /// Parses a self link of the given kind.
    pub fn from_self_link(kind: ResourceKind, link: &str) -> Result<Self> {
        let (name, scope) = parse_self_link(link, kind.collection())?;
        Ok(Self::new(kind, scope, name))
    }

    /// Path of this resource relative to `projects/{project}/`.
    ///
    /// ```
    /// use lbsweep_core::{ResourceKind, ResourceRef, Scope};
    ///
    /// let region = Scope::location("us-east1");
    /// let fr = ResourceRef::new(ResourceKind::ForwardingRule, region, "k8s-fw-a");
    /// assert_eq!(fr.api_path(), "regions/us-east1/forwardingRules/k8s-fw-a");
    /// ```
    pub fn api_path(&self) -> String {
        format!("{}/{}/{}", self.scope_path(), self.kind.collection(), self.name)
    }

    /// Scope portion of the API path: `global`, `regions/{r}` or `zones/{z}`.
    pub fn scope_path(&self) -> String {
        match (&self.scope, self.kind.locality()) {
            (Scope::Global, _) => "global".to_string(),
            (Scope::Location(region), Locality::Regional) => format!("regions/{region}"),
            (Scope::Location(zone), Locality::Zonal) => format!("zones/{zone}"),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.scope, self.kind.collection(), self.name)
    }
}

/// Extracts `(name, scope)` from a self link around the given collection keyword.
///
/// The path segment immediately preceding the keyword is the scope and the last
/// path segment is the resource name:
///
/// ```
/// use lbsweep_core::{parse_self_link, Scope};
///
/// let link = "https://www.googleapis.com/compute/v1/projects/p/global/urlMaps/k8s-um-default-app";
/// let (name, scope) = parse_self_link(link, "urlMaps").unwrap();
/// assert_eq!(name, "k8s-um-default-app");
/// assert_eq!(scope, Scope::Global);
/// ```
pub fn parse_self_link(link: &str, keyword: &str) -> Result<(String, Scope)> {
    let needle = format!("/{keyword}/");
    let pos = link
        .find(&needle)
        .ok_or_else(|| CoreError::invalid_self_link(link, format!("keyword {keyword} not found")))?;

    let before = &link[..pos];
    let scope_start = before
        .rfind('/')
        .ok_or_else(|| CoreError::invalid_self_link(link, "failed to find scope"))?;
    let scope = &before[scope_start + 1..];
    if scope.is_empty() {
        return Err(CoreError::invalid_self_link(link, "failed to find scope"));
    }

    let after = &link[pos + 1..];
    let name = after
        .rfind('/')
        .map(|i| &after[i + 1..])
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CoreError::invalid_self_link(link, "failed to find name"))?;

    Ok((name.to_string(), Scope::from(scope)))
}

/// Identifies which proxy collection a forwarding-rule target points into.
pub fn target_proxy_kind(target: &str) -> Option<ResourceKind> {
    if target.contains("/targetHttpsProxies/") {
        Some(ResourceKind::TargetHttpsProxy)
    } else if target.contains("/targetHttpProxies/") {
        Some(ResourceKind::TargetHttpProxy)
    } else {
        None
    }
}

/// Identifies which health-check collection a backend service reference points into.
pub fn health_check_kind(link: &str) -> Option<ResourceKind> {
    [
        ResourceKind::HealthCheck,
        ResourceKind::HttpHealthCheck,
        ResourceKind::HttpsHealthCheck,
    ]
    .into_iter()
    .find(|kind| link.contains(&format!("/{}/", kind.collection())))
}
