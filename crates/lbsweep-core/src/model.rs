//! Compute Engine v1 resource shapes.
//!
//! Only the fields the sweeper reads are modelled. Lists absent from a
//! response deserialize as empty.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::resource::{ResourceKind, ResourceRef};
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
}

impl ProxyProtocol {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Http => ResourceKind::TargetHttpProxy,
            Self::Https => ResourceKind::TargetHttpsProxy,
        }
    }

    pub fn from_kind(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::TargetHttpProxy => Some(Self::Http),
            ResourceKind::TargetHttpsProxy => Some(Self::Https),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRule {
    pub name: String,
    #[serde(default)]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

impl ForwardingRule {
    pub fn reference(&self) -> Result<ResourceRef> {
        ResourceRef::from_self_link(ResourceKind::ForwardingRule, &self.self_link)
    }

    pub fn created_at(&self) -> Result<Timestamp> {
        created_at(&self.name, self.creation_timestamp.as_deref())
    }
}

/// Target HTTP or HTTPS proxy. Certificates are only present on HTTPS proxies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProxy {
    pub name: String,
    #[serde(default)]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_map: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssl_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

impl TargetProxy {
    pub fn created_at(&self) -> Result<Timestamp> {
        created_at(&self.name, self.creation_timestamp.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlMap {
    pub name: String,
    #[serde(default)]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_service: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_matchers: Vec<PathMatcher>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMatcher {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_service: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_rules: Vec<PathRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl UrlMap {
    /// Every backend service link the map can route to, deduplicated in
    /// first-seen order: the map default, then each path matcher's default
    /// followed by its path rules.
    pub fn backend_service_links(&self) -> Vec<&str> {
        let candidates = std::iter::once(&self.default_service).chain(
            self.path_matchers.iter().flat_map(|matcher| {
                std::iter::once(&matcher.default_service)
                    .chain(matcher.path_rules.iter().map(|rule| &rule.service))
            }),
        );

        let mut links: Vec<&str> = Vec::new();
        for link in candidates.flatten() {
            if !links.contains(&link.as_str()) {
                links.push(link.as_str());
            }
        }
        links
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendService {
    pub name: String,
    #[serde(default)]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<Backend>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    #[serde(default)]
    pub group: String,
}

/// One entry of `instanceGroups.listInstances`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Firewall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl Instance {
    pub fn tag_items(&self) -> &[String] {
        self.tags.as_ref().map(|t| t.items.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub name: String,
}

fn created_at(name: &str, raw: Option<&str>) -> Result<Timestamp> {
    let raw = raw.ok_or_else(|| CoreError::missing_field(name, "creationTimestamp"))?;
    Timestamp::from_str(raw)
}
