//! Bounded worker pool for async reconciliation.
//!
//! Fixed worker count over a bounded queue; when the queue is full the
//! submitting task runs the job itself (caller-runs backpressure) instead
//! of dropping it. Created once at process start and never recreated.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::WorkerPoolConfig;
use crate::error::{ReconError, ReconResult};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct ReconWorkerPool {
    tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl ReconWorkerPool {
    pub fn new(config: &WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.max_pool_size.max(1))
            .map(|index| {
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only for the receive; the job itself
                        // runs unlocked so workers stay concurrent.
                        let job = { rx.lock().await.recv().await };
                        match job {
                            Some(job) => job.await,
                            None => {
                                debug!(worker = index, "recon worker queue closed, stopping");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit a job for execution on the pool.
    ///
    /// Returns a handle resolving to the job's output. If the queue is
    /// saturated the job executes inline on the caller before this method
    /// returns; the handle then resolves immediately. Dropping the handle is
    /// advisory only: it does not retract a job already queued or running.
    pub async fn submit<F, T>(&self, future: F) -> PendingResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = done_tx.send(future.await);
        });

        match self.tx.try_send(job) {
            Ok(()) => {}
            // Caller-runs backpressure: saturation (or a closed pool) means
            // the submitter does the work itself.
            Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => job.await,
        }

        PendingResult { rx: done_rx }
    }
}

/// Handle to a job submitted to the pool.
pub struct PendingResult<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for PendingResult<T> {
    type Output = ReconResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(|result| {
            result.map_err(|_| {
                ReconError::Internal("reconciliation worker dropped before completing".into())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_complete_on_pool_workers() {
        let pool = ReconWorkerPool::new(&WorkerPoolConfig {
            core_pool_size: 2,
            max_pool_size: 2,
            queue_capacity: 8,
        });

        let pending = pool.submit(async { 21 * 2 }).await;
        assert_eq!(pending.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn saturation_runs_on_the_caller_without_losing_jobs() {
        let pool = ReconWorkerPool::new(&WorkerPoolConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 1,
        });
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let completed = completed.clone();
            let pending = pool
                .submit(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            handles.push(pending);
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(completed.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn dropping_the_handle_does_not_cancel_the_job() {
        let pool = ReconWorkerPool::new(&WorkerPoolConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 8,
        });
        let completed = Arc::new(AtomicUsize::new(0));

        let marker = completed.clone();
        let pending = pool
            .submit(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                marker.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        drop(pending);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}
