pub mod classify;
pub mod error;
pub mod job;
pub mod model;
pub mod plan;
pub mod resource;
pub mod time;
pub mod tree;

pub use classify::{GRACE_WINDOW, Liveness, classify};
pub use error::{CoreError, Result};
pub use job::{Candidate, Job};
pub use model::{
    Backend, BackendService, Firewall, ForwardingRule, GroupMember, Instance, PathMatcher,
    PathRule, ProxyProtocol, Tags, TargetProxy, UrlMap, Zone,
};
pub use plan::{DeletionTask, PLAN_TTL, plan_deletion};
pub use resource::{
    Locality, ResourceKind, ResourceRef, Scope, health_check_kind, parse_self_link,
    target_proxy_kind,
};
pub use time::{Timestamp, now_utc};
pub use tree::{GroupMembership, ResolvedBackendService, ResolvedTree};
