//! Prometheus metrics for the sweeper.
//!
//! Counters cover the three decisions the service makes: how candidates were
//! classified, which deletion tasks were enqueued, and how each delivered
//! deletion ended. Firewall pass deletions are counted separately.

use lbsweep_core::{Liveness, ResourceKind};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const CANDIDATES_TOTAL: &str = "lbsweep_candidates_total";
    pub const TASKS_ENQUEUED_TOTAL: &str = "lbsweep_tasks_enqueued_total";
    pub const DELETIONS_TOTAL: &str = "lbsweep_deletions_total";
    pub const FIREWALL_RULES_DELETED_TOTAL: &str = "lbsweep_firewall_rules_deleted_total";
}

/// How one delivered deletion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    AlreadyGone,
    Expired,
    /// The kind never appears in a plan; the task was dropped unexecuted.
    Refused,
    Failed,
}

impl DeletionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::AlreadyGone => "already_gone",
            Self::Expired => "expired",
            Self::Refused => "refused",
            Self::Failed => "failed",
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at server startup.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics renders from the handle
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub fn record_candidate(verdict: Liveness) {
    counter!(names::CANDIDATES_TOTAL, "verdict" => verdict.as_str()).increment(1);
}

pub fn record_task_enqueued(kind: ResourceKind) {
    counter!(names::TASKS_ENQUEUED_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_deletion(kind: ResourceKind, outcome: DeletionOutcome) {
    counter!(
        names::DELETIONS_TOTAL,
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_firewall_rule_deleted() {
    counter!(names::FIREWALL_RULES_DELETED_TOTAL).increment(1);
}
