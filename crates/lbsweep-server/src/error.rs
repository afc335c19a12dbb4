use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lbsweep_compute::ComputeError;
use lbsweep_core::CoreError;
use serde_json::json;

/// Failure to materialize one candidate chain.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Parse(#[from] CoreError),
}

impl ResolveError {
    /// A structural link (proxy, url map, backend service) no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Compute(e) if e.is_not_found())
    }
}

/// Failure to hand a job to a work queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue configuration error: {0}")]
    Configuration(String),

    #[error("Queue transport error: {0}")]
    Transport(String),

    #[error("Queue API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Queue closed")]
    Closed,

    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueueError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Which stage of the firewall pass failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallStage {
    ListFirewalls,
    ListZones,
    ListInstances,
    DeleteRule,
}

impl std::fmt::Display for FirewallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ListFirewalls => "listing firewalls",
            Self::ListZones => "listing zones",
            Self::ListInstances => "listing instances",
            Self::DeleteRule => "deleting firewall rule",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Firewall pass aborted while {stage} ({subject}): {source}")]
pub struct FirewallError {
    pub stage: FirewallStage,
    /// Zone or rule name the failing call addressed; empty for project-wide listings.
    pub subject: String,
    #[source]
    pub source: ComputeError,
}

impl FirewallError {
    pub fn new(stage: FirewallStage, subject: impl Into<String>, source: ComputeError) -> Self {
        Self {
            stage,
            subject: subject.into(),
            source,
        }
    }
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A Compute Engine call behind a check pass failed.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // Cron and Cloud Tasks only distinguish success from failure
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Upstream(_) => "upstream",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<FirewallError> for ApiError {
    fn from(value: FirewallError) -> Self {
        ApiError::upstream(value.to_string())
    }
}
