//! In-process work queue.
//!
//! Jobs travel over an unbounded channel to a consumer that runs them through
//! the [`JobRunner`] on a bounded number of concurrent workers. A `Retry`
//! outcome schedules redelivery after an exponentially growing delay until
//! the job has been delivered `max_attempts` times.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lbsweep_core::Job;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

use super::WorkQueue;
use crate::error::QueueError;
use crate::worker::{JobOutcome, JobRunner};

/// Upper bound on one redelivery delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct Delivery {
    job: Job,
    /// Deliveries already made, starting at zero.
    attempt: u32,
}

#[derive(Debug)]
pub struct LocalQueue {
    name: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Receiving half of a [`LocalQueue`]; started once the runner exists.
#[derive(Debug)]
pub struct LocalQueueConsumer {
    rx: mpsc::UnboundedReceiver<Delivery>,
    redeliver: mpsc::WeakUnboundedSender<Delivery>,
    max_attempts: u32,
    initial_backoff: Duration,
    workers: usize,
}

impl LocalQueue {
    pub fn new(
        name: impl Into<String>,
        max_attempts: u32,
        initial_backoff: Duration,
        workers: usize,
    ) -> (Self, LocalQueueConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = LocalQueueConsumer {
            rx,
            redeliver: tx.downgrade(),
            max_attempts: max_attempts.max(1),
            initial_backoff,
            workers: workers.max(1),
        };
        (
            Self {
                name: name.into(),
                tx,
            },
            consumer,
        )
    }
}

#[async_trait]
impl WorkQueue for LocalQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        self.tx
            .send(Delivery {
                job: job.clone(),
                attempt: 0,
            })
            .map_err(|_| QueueError::Closed)
    }
}

/// Delay before redelivery number `attempt + 1`.
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}

impl LocalQueueConsumer {
    /// Runs deliveries until every sender is gone.
    pub fn start(mut self, runner: Arc<JobRunner>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let permits = Arc::new(Semaphore::new(self.workers));
            tracing::info!(workers = self.workers, "local queue consumer started");

            while let Some(delivery) = self.rx.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let runner = runner.clone();
                let redeliver = self.redeliver.clone();
                let max_attempts = self.max_attempts;
                let initial_backoff = self.initial_backoff;

                tokio::spawn(async move {
                    let outcome = runner.run(&delivery.job).await;
                    drop(permit);

                    if outcome == JobOutcome::Ack {
                        return;
                    }
                    let next_attempt = delivery.attempt + 1;
                    if next_attempt >= max_attempts {
                        tracing::error!(
                            job = delivery.job.kind(),
                            attempts = next_attempt,
                            "job exhausted its delivery attempts; dropping"
                        );
                        return;
                    }

                    let delay = backoff_delay(initial_backoff, delivery.attempt);
                    tracing::debug!(
                        job = delivery.job.kind(),
                        attempt = next_attempt,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling redelivery"
                    );
                    tokio::time::sleep(delay).await;
                    if let Some(tx) = redeliver.upgrade() {
                        let _ = tx.send(Delivery {
                            job: delivery.job,
                            attempt: next_attempt,
                        });
                    }
                });
            }

            tracing::info!("local queue consumer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbsweep_core::{Candidate, ResourceKind, ResourceRef};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let initial = Duration::from_millis(100);
        assert_eq!(backoff_delay(initial, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(initial, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(initial, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(initial, 40), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_enqueue_fails_once_consumer_dropped() {
        let (queue, consumer) = LocalQueue::new("local", 3, Duration::from_millis(1), 1);
        let job = Job::Evaluate(Candidate::orphan(ResourceRef::global(
            ResourceKind::TargetHttpProxy,
            "k8s-tp-a",
        )));
        assert!(queue.enqueue(&job).await.is_ok());
        drop(consumer);
        assert!(matches!(queue.enqueue(&job).await, Err(QueueError::Closed)));
    }
}
