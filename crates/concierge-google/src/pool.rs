//! Bounded pool for blocking credential work.
//!
//! Refresh exchanges, the interactive consent flow and client construction
//! all block. They run on tokio's blocking threads, with a semaphore capping
//! how many may run at once so a burst of callers cannot exhaust them.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::trace;

use crate::error::{AuthError, AuthResult};

/// Runs blocking jobs with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingPool {
    /// Creates a pool that runs at most `size` jobs at once.
    ///
    /// A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Returns the maximum number of concurrent jobs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns how many more jobs could start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `job` on a blocking thread once a slot is free.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the pool was closed or the job panicked.
    pub async fn run<F, T>(&self, job: F) -> AuthResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AuthError::internal("worker pool is closed").with_source(e))?;

        trace!(available = self.permits.available_permits(), "starting blocking job");

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| AuthError::internal(format!("blocking job failed: {}", e)).with_source(e))
    }

    /// Stops accepting new jobs. Jobs already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_job_and_returns_value() {
        let pool = BlockingPool::new(2);
        let value = pool.run(|| 40 + 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn zero_size_is_raised() {
        assert_eq!(BlockingPool::new(0).size(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bounds_concurrency() {
        let pool = BlockingPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_job_is_internal_error() {
        let pool = BlockingPool::new(1);
        let err = pool.run(|| -> u8 { panic!("boom") }).await.unwrap_err();
        assert_eq!(err.code(), crate::AuthErrorCode::Internal);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn closed_pool_rejects_jobs() {
        let pool = BlockingPool::new(1);
        pool.close();
        let err = pool.run(|| ()).await.unwrap_err();
        assert_eq!(err.code(), crate::AuthErrorCode::Internal);
    }
}
