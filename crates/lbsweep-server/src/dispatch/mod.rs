//! Work queues that carry [`Job`]s to the job runner.
//!
//! Every backend delivers at least once: a job whose run ends in
//! `JobOutcome::Retry` is delivered again later.
//!
//! - [`CloudTasksQueue`]: HTTP tasks on a Cloud Tasks queue, delivered to `POST /jobs`
//! - [`LocalQueue`]: in-process channel with exponential-backoff redelivery
//! - [`InMemoryQueue`]: records jobs without running them

use std::sync::Arc;

use async_trait::async_trait;
use lbsweep_core::Job;

use crate::error::QueueError;

pub mod cloud_tasks;
pub mod local;
pub mod memory;

pub use cloud_tasks::{CloudTasksConfig, CloudTasksQueue};
pub use local::{LocalQueue, LocalQueueConsumer};
pub use memory::InMemoryQueue;

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queue name used in logs.
    fn name(&self) -> &str;

    /// Accepts one job for delivery. Success means the queue owns the job.
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError>;
}

/// Shared handle to a work queue.
pub type DynQueue = Arc<dyn WorkQueue>;
