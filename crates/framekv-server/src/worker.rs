use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::Semaphore;
use tokio::task;

/// Bounded executor for command work. Jobs run on blocking threads so store
/// access and payload decode stay off the connection I/O tasks; the permit
/// count caps how many run at once.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Submits a job and waits for its result. Returns an error if the job
    /// panicked.
    pub async fn submit<T, F>(&self, job: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("worker pool is closed")?;
        task::spawn_blocking(job).await.context("worker job failed")
    }
}
