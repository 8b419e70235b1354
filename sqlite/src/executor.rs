//! Serialized job execution on dedicated threads.
//!
//! A [`Worker`] owns a piece of state on its own thread and runs jobs against
//! it strictly in submission order. Stores use one worker each to own their
//! connection and registry, so no statement or schema change ever races
//! another.
//!
//! [`WorkQueue`] is the same machinery without state, and [`work_queue`]
//! returns a process-wide instance for callers that want blocking store
//! calls off their own thread.
//!
//! ```
//! use recordstore_sqlite::work_queue;
//!
//! let queue = work_queue().unwrap();
//! let answer = queue.run(|| 6 * 7).unwrap();
//! assert_eq!(answer, 42);
//! ```

use std::sync::mpsc;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::{Result, StoreError};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Cloneable submission side of a [`Worker`].
pub(crate) struct WorkerHandle<S> {
    sender: mpsc::Sender<Job<S>>,
}

impl<S> Clone for WorkerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: 'static> WorkerHandle<S> {
    /// Enqueues a job without waiting for it.
    pub(crate) fn submit(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        self.sender
            .send(Box::new(job))
            .map_err(|_| StoreError::Closed)
    }

    /// Runs `job` on the worker and blocks until it has finished.
    pub(crate) fn run<T: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> T + Send + 'static,
    ) -> Result<T> {
        let (response_tx, response_rx) = mpsc::channel();
        self.submit(move |state| {
            // The caller may have given up; nothing to report to.
            let _ = response_tx.send(job(state));
        })?;
        response_rx
            .recv()
            .map_err(|_| StoreError::Worker("worker stopped before answering".to_string()))
    }
}

/// A named thread that owns `S` and runs jobs against it in FIFO order.
pub(crate) struct Worker<S> {
    name: String,
    handle: Option<WorkerHandle<S>>,
    thread: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> Worker<S> {
    /// Moves `state` onto a new thread named `name`.
    pub(crate) fn spawn(name: impl Into<String>, state: S) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job<S>>();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut state = state;
                while let Ok(job) = receiver.recv() {
                    job(&mut state);
                }
            })
            .map_err(|err| StoreError::Worker(format!("failed to spawn {name}: {err}")))?;
        Ok(Self {
            name,
            handle: Some(WorkerHandle { sender }),
            thread: Some(thread),
        })
    }

    /// Returns a submission handle. `None` once shut down.
    pub(crate) fn handle(&self) -> Option<WorkerHandle<S>> {
        self.handle.clone()
    }

    /// Stops accepting jobs, lets queued jobs finish and joins the thread.
    /// The state is dropped on the worker thread.
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        self.handle = None;
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| StoreError::Worker(format!("{} panicked", self.name)))?;
            debug!(worker = %self.name, "Worker stopped");
        }
        Ok(())
    }
}

impl<S> Drop for Worker<S> {
    fn drop(&mut self) {
        self.handle = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A single background thread running closures in submission order.
pub struct WorkQueue {
    worker: Mutex<Worker<()>>,
}

impl WorkQueue {
    /// Starts a queue on a thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Worker`] if the thread cannot be spawned.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            worker: Mutex::new(Worker::spawn(name, ())?),
        })
    }

    fn handle(&self) -> Result<WorkerHandle<()>> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle()
            .ok_or(StoreError::Closed)
    }

    /// Enqueues `job` and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        self.handle()?.submit(move |_| job())
    }

    /// Runs `job` on the queue and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after shutdown and
    /// [`StoreError::Worker`] if the job panicked.
    pub fn run<T: Send + 'static>(&self, job: impl FnOnce() -> T + Send + 'static) -> Result<T> {
        self.handle()?.run(move |_| job())
    }

    /// Finishes queued jobs and stops the thread. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Worker`] if a job panicked the thread.
    pub fn shutdown(&self) -> Result<()> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown()
    }
}

static WORK_QUEUE: OnceLock<WorkQueue> = OnceLock::new();

/// Process-wide background [`WorkQueue`], started on first use.
///
/// # Errors
///
/// Returns [`StoreError::Worker`] if the thread cannot be spawned.
pub fn work_queue() -> Result<&'static WorkQueue> {
    if let Some(queue) = WORK_QUEUE.get() {
        return Ok(queue);
    }
    let queue = WorkQueue::new("recordstore-work")?;
    Ok(WORK_QUEUE.get_or_init(|| queue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_jobs_run_in_order() {
        let worker = Worker::spawn("test-order", Vec::<u32>::new()).unwrap();
        let handle = worker.handle().unwrap();
        for i in 0..50 {
            handle.submit(move |log| log.push(i)).unwrap();
        }
        let log = handle.run(|log| log.clone()).unwrap();
        assert_eq!(log, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_closes_handles() {
        let mut worker = Worker::spawn("test-shutdown", 0u32).unwrap();
        let handle = worker.handle().unwrap();
        handle.submit(|count| *count += 1).unwrap();
        drop(handle);

        worker.shutdown().unwrap();
        assert!(worker.handle().is_none());
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_work_queue_from_many_threads() {
        let queue = Arc::new(WorkQueue::new("test-queue").unwrap());
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.run(move || i * 10).unwrap())
            })
            .collect();
        let mut results: Vec<i32> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        results.sort();
        assert_eq!(results, vec![0, 10, 20, 30]);

        queue.shutdown().unwrap();
        assert!(matches!(queue.run(|| ()), Err(StoreError::Closed)));
    }

    #[test]
    fn test_global_queue_is_shared() {
        let first = work_queue().unwrap() as *const WorkQueue;
        let second = work_queue().unwrap() as *const WorkQueue;
        assert_eq!(first, second);
    }
}
