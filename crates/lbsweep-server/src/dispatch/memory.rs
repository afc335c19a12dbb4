use async_trait::async_trait;
use lbsweep_core::{DeletionTask, Job};
use parking_lot::Mutex;

use super::WorkQueue;
use crate::error::QueueError;

/// Queue that only records what it was given.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    jobs: Mutex<Vec<Job>>,
    /// Remaining enqueue calls that succeed before every call fails; `None` never fails.
    accept_limit: Mutex<Option<usize>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `n` enqueues succeed and fails every one after.
    pub fn fail_after(&self, n: usize) {
        *self.accept_limit.lock() = Some(n);
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<Job> {
        std::mem::take(&mut *self.jobs.lock())
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded deletion tasks, in enqueue order.
    pub fn deletion_tasks(&self) -> Vec<DeletionTask> {
        self.jobs
            .lock()
            .iter()
            .filter_map(|job| match job {
                Job::Delete(task) => Some(task.clone()),
                Job::Evaluate(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        {
            let mut limit = self.accept_limit.lock();
            match limit.as_mut() {
                Some(0) => return Err(QueueError::transport("in-memory queue rejecting jobs")),
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }
        self.jobs.lock().push(job.clone());
        Ok(())
    }
}
