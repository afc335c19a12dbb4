//! The forwarding-rule check pass.
//!
//! Lists controller forwarding rules and orphan proxies and enqueues one
//! evaluate job per chain root. Evaluation itself happens when the queue
//! delivers those jobs.

use lbsweep_compute::{ComputeError, DynCompute};
use lbsweep_core::{Job, ProxyProtocol};
use serde::Serialize;

use super::resolver::{list_candidate_forwarding_rules, list_orphan_proxies};
use crate::config::SweepConfig;
use crate::dispatch::DynQueue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub http_rules: usize,
    pub https_rules: usize,
    /// Prefixed forwarding rules that do not target an HTTP(S) proxy.
    pub skipped_rules: usize,
    pub orphan_proxies: usize,
    /// Proxy protocols whose listing failed during the orphan scan.
    pub failed_protocols: Vec<ProxyProtocol>,
    pub enqueued: usize,
    pub enqueue_failures: usize,
}

/// Runs one check pass.
///
/// Fails only when forwarding rules cannot be listed. Every other problem is
/// logged, counted in the report, and left for the next trigger.
pub async fn run_check_pass(
    compute: &DynCompute,
    queue: &DynQueue,
    sweep: &SweepConfig,
) -> Result<CheckReport, ComputeError> {
    let listing = list_candidate_forwarding_rules(compute, &sweep.forwarding_rule_prefix).await?;
    let orphans =
        list_orphan_proxies(compute, &sweep.proxy_prefix, &listing.seen_proxies()).await;

    let mut report = CheckReport {
        http_rules: listing.http.len(),
        https_rules: listing.https.len(),
        skipped_rules: listing.skipped,
        orphan_proxies: orphans.candidates.len(),
        failed_protocols: orphans.failed_protocols.clone(),
        ..Default::default()
    };

    for candidate in listing.candidates().chain(orphans.candidates.iter()) {
        match queue.enqueue(&Job::Evaluate(candidate.clone())).await {
            Ok(()) => report.enqueued += 1,
            Err(e) => {
                tracing::error!(
                    %candidate,
                    queue = queue.name(),
                    error = %e,
                    "failed to enqueue candidate"
                );
                report.enqueue_failures += 1;
            }
        }
    }

    tracing::info!(
        http = report.http_rules,
        https = report.https_rules,
        orphans = report.orphan_proxies,
        enqueued = report.enqueued,
        enqueue_failures = report.enqueue_failures,
        "check pass finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InMemoryQueue;
    use lbsweep_compute_memory::{BackendFixture, ChainFixture, InMemoryCompute, Operation};
    use lbsweep_core::{Candidate, Timestamp};
    use std::sync::Arc;
    use time::macros::datetime;

    fn created() -> Timestamp {
        Timestamp::new(datetime!(2024-01-01 09:00:00 UTC))
    }

    #[tokio::test]
    async fn test_enqueues_rules_then_orphans() {
        let memory = Arc::new(InMemoryCompute::new("p"));
        let memory_queue = Arc::new(InMemoryQueue::new());
        let compute: DynCompute = memory.clone();
        let queue: DynQueue = memory_queue.clone();

        let live = ChainFixture::new("a", ProxyProtocol::Http, created())
            .backend(BackendFixture::new("k8s-be-1", &[1]))
            .install(&memory);
        let orphan = ChainFixture::new("b", ProxyProtocol::Http, created())
            .orphan()
            .backend(BackendFixture::new("k8s-be-2", &[0]))
            .install(&memory);

        let report = run_check_pass(&compute, &queue, &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.http_rules, 1);
        assert_eq!(report.orphan_proxies, 1);
        assert_eq!(report.enqueued, 2);
        assert_eq!(
            memory_queue.jobs(),
            vec![
                Job::Evaluate(Candidate::forwarding_rule(
                    live.forwarding_rule.unwrap(),
                    live.proxy
                )),
                Job::Evaluate(Candidate::orphan(orphan.proxy)),
            ]
        );
        assert_eq!(memory.calls_of(Operation::Delete), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_fails_pass() {
        let memory = Arc::new(InMemoryCompute::new("p"));
        memory.fail(Operation::ListForwardingRules, 500);
        let compute: DynCompute = memory.clone();
        let queue: DynQueue = Arc::new(InMemoryQueue::new());

        assert!(
            run_check_pass(&compute, &queue, &SweepConfig::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_enqueue_failures_are_counted() {
        let memory = Arc::new(InMemoryCompute::new("p"));
        let memory_queue = Arc::new(InMemoryQueue::new());
        memory_queue.fail_after(0);
        let compute: DynCompute = memory.clone();
        let queue: DynQueue = memory_queue.clone();
        ChainFixture::new("a", ProxyProtocol::Https, created()).install(&memory);

        let report = run_check_pass(&compute, &queue, &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.https_rules, 1);
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.enqueue_failures, 1);
    }
}
