//! Queue envelope shared by the dispatcher and every work queue backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plan::DeletionTask;
use crate::resource::ResourceRef;

/// A chain root awaiting evaluation.
///
/// Forwarding-rule candidates carry both the rule and the proxy it targets;
/// orphan proxies carry only the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarding_rule: Option<ResourceRef>,
    pub proxy: ResourceRef,
}

impl Candidate {
    pub fn forwarding_rule(rule: ResourceRef, proxy: ResourceRef) -> Self {
        Self {
            forwarding_rule: Some(rule),
            proxy,
        }
    }

    pub fn orphan(proxy: ResourceRef) -> Self {
        Self {
            forwarding_rule: None,
            proxy,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.forwarding_rule.is_none()
    }

    /// The object the candidate is named after in logs.
    pub fn root(&self) -> &ResourceRef {
        self.forwarding_rule.as_ref().unwrap_or(&self.proxy)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.forwarding_rule {
            Some(rule) => write!(f, "{rule} -> {}", self.proxy),
            None => write!(f, "{} (orphan)", self.proxy),
        }
    }
}

/// One unit of queued work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    Evaluate(Candidate),
    Delete(DeletionTask),
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Evaluate(_) => "evaluate",
            Self::Delete(_) => "delete",
        }
    }
}

impl From<Candidate> for Job {
    fn from(value: Candidate) -> Self {
        Self::Evaluate(value)
    }
}

impl From<DeletionTask> for Job {
    fn from(value: DeletionTask) -> Self {
        Self::Delete(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceKind, Scope};
    use crate::time::Timestamp;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_delete_job_wire_format() {
        let job = Job::Delete(DeletionTask::new(
            ResourceRef::new(
                ResourceKind::ForwardingRule,
                Scope::location("us-east1"),
                "k8s-fw-default-app",
            ),
            Timestamp::new(datetime!(2024-01-01 12:15:00 UTC)),
        ));

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            json!({
                "job": "delete",
                "target": {"kind": "forwarding_rule", "scope": "us-east1", "name": "k8s-fw-default-app"},
                "expires_at": "2024-01-01T12:15:00Z"
            })
        );
        assert_eq!(serde_json::from_value::<Job>(value).unwrap(), job);
    }

    #[test]
    fn test_orphan_candidate_omits_forwarding_rule() {
        let candidate = Candidate::orphan(ResourceRef::global(
            ResourceKind::TargetHttpProxy,
            "k8s-tp-default-old",
        ));
        let value = serde_json::to_value(Job::from(candidate.clone())).unwrap();
        assert_eq!(value["job"], "evaluate");
        assert!(value.get("forwarding_rule").is_none());

        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back, Job::Evaluate(candidate));
    }

    #[test]
    fn test_unknown_job_rejected() {
        let err = serde_json::from_value::<Job>(json!({"job": "purge", "name": "x"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_candidate_root() {
        let proxy = ResourceRef::global(ResourceKind::TargetHttpsProxy, "k8s-tps-a");
        let rule = ResourceRef::global(ResourceKind::ForwardingRule, "k8s-fw-a");
        assert_eq!(Candidate::orphan(proxy.clone()).root(), &proxy);
        assert_eq!(Candidate::forwarding_rule(rule.clone(), proxy).root(), &rule);
    }
}
