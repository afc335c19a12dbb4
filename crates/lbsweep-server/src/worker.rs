//! Job execution.
//!
//! [`JobRunner`] is what a queue delivery ends up calling, whether it arrives
//! over HTTP from Cloud Tasks or from the in-process consumer. An evaluate job
//! resolves one chain, classifies it and, when it is dead, enqueues one delete
//! job per resource. A delete job removes exactly one resource.

use std::sync::Arc;

use lbsweep_compute::DynCompute;
use lbsweep_core::{
    Candidate, DeletionTask, Job, Liveness, Timestamp, classify, now_utc, plan_deletion,
};
use serde::Serialize;

use crate::dispatch::DynQueue;
use crate::metrics::{self, DeletionOutcome};
use crate::reconcile::resolve_chain;

/// Source of "now" for expiry and grace-window checks.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// What the queue should do with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Done; never deliver again.
    Ack,
    /// Deliver again later.
    Retry,
}

pub struct JobRunner {
    compute: DynCompute,
    queue: DynQueue,
    dry_run: bool,
    clock: Clock,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("project", &self.compute.project_id())
            .field("queue", &self.queue.name())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl JobRunner {
    pub fn new(compute: DynCompute, queue: DynQueue, dry_run: bool) -> Self {
        Self {
            compute,
            queue,
            dry_run,
            clock: Arc::new(now_utc),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn run(&self, job: &Job) -> JobOutcome {
        match job {
            Job::Evaluate(candidate) => self.evaluate(candidate).await,
            Job::Delete(task) => self.delete(task).await,
        }
    }

    async fn evaluate(&self, candidate: &Candidate) -> JobOutcome {
        let tree = match resolve_chain(&self.compute, candidate).await {
            Ok(tree) => tree,
            Err(e) if e.is_not_found() => {
                tracing::debug!(%candidate, error = %e, "chain already partially gone");
                return JobOutcome::Ack;
            }
            Err(e) => {
                tracing::warn!(
                    %candidate,
                    error = %e,
                    "could not resolve chain; leaving it alone"
                );
                return JobOutcome::Ack;
            }
        };

        let now = (self.clock)();
        let verdict = classify(&tree, tree.created_at, now);
        metrics::record_candidate(verdict);
        if verdict == Liveness::Alive {
            tracing::debug!(%candidate, instances = tree.total_instances(), "chain is alive");
            return JobOutcome::Ack;
        }

        if tree.failed_lookups() > 0 {
            tracing::warn!(
                %candidate,
                failed_lookups = tree.failed_lookups(),
                "planning deletion although some instance groups could not be read"
            );
        }

        let tasks = plan_deletion(&tree, now);
        tracing::info!(
            %candidate,
            tasks = tasks.len(),
            dry_run = self.dry_run,
            "chain is dead"
        );

        if self.dry_run {
            for task in &tasks {
                tracing::info!(resource = %task.target, "dry run: would delete");
            }
            return JobOutcome::Ack;
        }

        for task in tasks {
            let kind = task.target.kind;
            let target = task.target.clone();
            if let Err(e) = self.queue.enqueue(&Job::Delete(task)).await {
                tracing::error!(
                    %candidate,
                    resource = %target,
                    error = %e,
                    "failed to enqueue deletion task"
                );
                return JobOutcome::Retry;
            }
            metrics::record_task_enqueued(kind);
        }
        JobOutcome::Ack
    }

    async fn delete(&self, task: &DeletionTask) -> JobOutcome {
        let kind = task.target.kind;
        if !kind.is_plannable() {
            tracing::warn!(resource = %task.target, "refusing to delete a kind no plan contains");
            metrics::record_deletion(kind, DeletionOutcome::Refused);
            return JobOutcome::Ack;
        }

        if task.is_expired((self.clock)()) {
            tracing::info!(
                resource = %task.target,
                expires_at = %task.expires_at,
                "deletion task expired"
            );
            metrics::record_deletion(kind, DeletionOutcome::Expired);
            return JobOutcome::Ack;
        }

        if self.dry_run {
            tracing::info!(resource = %task.target, "dry run: would delete");
            return JobOutcome::Ack;
        }

        match self.compute.delete(&task.target).await {
            Ok(()) => {
                tracing::info!(resource = %task.target, "deleted");
                metrics::record_deletion(kind, DeletionOutcome::Deleted);
                JobOutcome::Ack
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(resource = %task.target, "already deleted");
                metrics::record_deletion(kind, DeletionOutcome::AlreadyGone);
                JobOutcome::Ack
            }
            Err(e) => {
                tracing::warn!(
                    resource = %task.target,
                    error = %e,
                    error.category = e.category(),
                    "delete failed; will retry"
                );
                metrics::record_deletion(kind, DeletionOutcome::Failed);
                JobOutcome::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InMemoryQueue;
    use lbsweep_compute_memory::{BackendFixture, ChainFixture, InMemoryCompute, Operation};
    use lbsweep_core::{PLAN_TTL, ProxyProtocol, ResourceKind, ResourceRef, Scope};
    use time::macros::datetime;

    const NOW: Timestamp = Timestamp(datetime!(2024-01-01 12:00:00 UTC));

    struct Harness {
        compute: Arc<InMemoryCompute>,
        queue: Arc<InMemoryQueue>,
        runner: JobRunner,
    }

    fn harness(dry_run: bool) -> Harness {
        let compute = Arc::new(InMemoryCompute::new("p"));
        let queue = Arc::new(InMemoryQueue::new());
        let runner = JobRunner::new(compute.clone(), queue.clone(), dry_run)
            .with_clock(Arc::new(|| NOW));
        Harness {
            compute,
            queue,
            runner,
        }
    }

    fn hours_ago(hours: i64) -> Timestamp {
        NOW.plus(time::Duration::hours(-hours))
    }

    #[tokio::test]
    async fn test_dead_chain_enqueues_plan() {
        let h = harness(false);
        let chain = ChainFixture::new("default-app", ProxyProtocol::Https, hours_ago(3))
            .backend(BackendFixture::new("k8s-be-30001", &[0]))
            .install(&h.compute);
        let candidate = Candidate::forwarding_rule(
            chain.forwarding_rule.clone().unwrap(),
            chain.proxy.clone(),
        );

        assert_eq!(h.runner.run(&Job::Evaluate(candidate)).await, JobOutcome::Ack);

        let tasks = h.queue.deletion_tasks();
        let targets: Vec<_> = tasks.iter().map(|t| t.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                chain.proxy.clone(),
                chain.certificate.clone().unwrap(),
                chain.backend_services[0].clone(),
                chain.health_checks[0].clone(),
                chain.url_map.clone(),
                chain.forwarding_rule.clone().unwrap(),
            ]
        );
        assert!(tasks.iter().all(|t| t.expires_at == NOW.plus(PLAN_TTL)));
        assert_eq!(h.compute.calls_of(Operation::Delete), 0);
    }

    #[tokio::test]
    async fn test_young_chain_is_left_alone() {
        let h = harness(false);
        let created = NOW.plus(time::Duration::minutes(-30));
        let chain = ChainFixture::new("fresh", ProxyProtocol::Http, created)
            .backend(BackendFixture::new("k8s-be-1", &[0]))
            .install(&h.compute);
        let candidate = Candidate::orphan(chain.proxy);

        assert_eq!(h.runner.run(&Job::Evaluate(candidate)).await, JobOutcome::Ack);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_chain_with_instances_is_alive() {
        let h = harness(false);
        let chain = ChainFixture::new("busy", ProxyProtocol::Http, hours_ago(5))
            .backend(BackendFixture::new("k8s-be-1", &[0, 3]))
            .install(&h.compute);

        let job = Job::Evaluate(Candidate::orphan(chain.proxy));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Ack);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_enqueueing() {
        let h = harness(true);
        let chain = ChainFixture::new("idle", ProxyProtocol::Http, hours_ago(2))
            .backend(BackendFixture::new("k8s-be-1", &[0]))
            .install(&h.compute);

        let job = Job::Evaluate(Candidate::orphan(chain.proxy));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Ack);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_retries_evaluation() {
        let h = harness(false);
        let chain = ChainFixture::new("idle", ProxyProtocol::Http, hours_ago(2))
            .backend(BackendFixture::new("k8s-be-1", &[0]))
            .install(&h.compute);
        h.queue.fail_after(2);

        let job = Job::Evaluate(Candidate::orphan(chain.proxy));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Retry);
        assert_eq!(h.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_vanished_chain_acks() {
        let h = harness(false);
        let proxy = ResourceRef::global(ResourceKind::TargetHttpProxy, "k8s-tp-gone");
        let job = Job::Evaluate(Candidate::orphan(proxy));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Ack);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_expired_task_makes_no_api_call() {
        let h = harness(false);
        let target = ResourceRef::global(ResourceKind::UrlMap, "k8s-um-a");
        h.compute.insert_leaf(target.clone());
        let task = DeletionTask::new(target.clone(), NOW.plus(time::Duration::seconds(-1)));

        assert_eq!(h.runner.run(&Job::Delete(task)).await, JobOutcome::Ack);
        assert_eq!(h.compute.call_count(), 0);
        assert!(h.compute.contains(&target));
    }

    #[tokio::test]
    async fn test_task_at_expiry_instant_still_runs() {
        let h = harness(false);
        let target = ResourceRef::global(ResourceKind::UrlMap, "k8s-um-a");
        h.compute.insert_leaf(target.clone());

        let job = Job::Delete(DeletionTask::new(target.clone(), NOW));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Ack);
        assert!(!h.compute.contains(&target));
    }

    #[tokio::test]
    async fn test_not_found_on_delete_acks_for_every_kind() {
        let h = harness(false);
        for kind in ResourceKind::ALL.into_iter().filter(|k| k.is_plannable()) {
            let target = ResourceRef::global(kind, "missing");
            let task = DeletionTask::new(target, NOW.plus(PLAN_TTL));
            assert_eq!(
                h.runner.run(&Job::Delete(task)).await,
                JobOutcome::Ack,
                "{kind:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_instance_group_delete_is_refused_without_calls() {
        let h = harness(false);
        let group = ResourceRef::new(
            ResourceKind::InstanceGroup,
            Scope::location("us-central1-a"),
            "k8s-ig--live",
        );
        h.compute.insert_instance_group(group.clone(), Vec::new());

        let job = Job::Delete(DeletionTask::new(group.clone(), NOW.plus(PLAN_TTL)));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Ack);
        assert_eq!(h.compute.call_count(), 0);
        assert!(h.compute.contains(&group));
    }

    #[tokio::test]
    async fn test_firewall_delete_is_refused_without_calls() {
        let h = harness(false);
        let rule = ResourceRef::global(ResourceKind::Firewall, "k8s-fw-pool-a");
        let job = Job::Delete(DeletionTask::new(rule, NOW.plus(PLAN_TTL)));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Ack);
        assert_eq!(h.compute.call_count(), 0);
    }

    #[tokio::test]
    async fn test_other_delete_errors_retry() {
        let h = harness(false);
        let target = ResourceRef::global(ResourceKind::BackendService, "k8s-be-1");
        h.compute.insert_leaf(target.clone());
        h.compute.fail(Operation::Delete, 400);

        let job = Job::Delete(DeletionTask::new(target.clone(), NOW.plus(PLAN_TTL)));
        assert_eq!(h.runner.run(&job).await, JobOutcome::Retry);
        assert!(h.compute.contains(&target));
    }
}
