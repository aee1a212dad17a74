//! Work queues for [`dispatch`](crate::compose::dispatch).
//!
//! The engine never spawns threads itself. A dispatch stage hands each
//! delivery to a [`WorkQueue`] and returns at once; whatever concurrency the
//! queue provides is where downstream stages run.
//!
//! Three queues ship with the crate:
//!
//! | Queue | Runs jobs |
//! |-------|-----------|
//! | [`InlineQueue`] | immediately, on the enqueuing thread |
//! | [`DeferredQueue`] | when [`DeferredQueue::run_pending`] is called |
//! | [`WorkerPool`] | on a fixed set of named worker threads |

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use either::Either;
use parking_lot::Mutex;

/// A unit of work handed to a queue.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run zero-argument closures.
pub trait WorkQueue: Send + Sync {
    /// Schedule `job`. Ordering and parallelism are up to the queue.
    fn enqueue(&self, job: Job);
}

impl<Q: WorkQueue + ?Sized> WorkQueue for Arc<Q> {
    fn enqueue(&self, job: Job) {
        (**self).enqueue(job)
    }
}

impl<Q: WorkQueue + ?Sized> WorkQueue for Box<Q> {
    fn enqueue(&self, job: Job) {
        (**self).enqueue(job)
    }
}

impl<L, R> WorkQueue for Either<L, R>
where
    L: WorkQueue,
    R: WorkQueue,
{
    fn enqueue(&self, job: Job) {
        match self {
            Either::Left(l) => l.enqueue(job),
            Either::Right(r) => r.enqueue(job),
        }
    }
}

/// Runs every job on the spot.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineQueue;

impl WorkQueue for InlineQueue {
    fn enqueue(&self, job: Job) {
        job()
    }
}

/// Holds jobs until they are explicitly run, in FIFO order.
#[derive(Default)]
pub struct DeferredQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued jobs until the queue is empty, including jobs enqueued by
    /// the jobs being run. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run outside it: jobs may enqueue more work.
            let job = self.jobs.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl WorkQueue for DeferredQueue {
    fn enqueue(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Settings for a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads; at least one is always started.
    pub workers: usize,
    /// Prefix for worker thread names, suffixed with `-{index}`.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            workers: thread::available_parallelism().map_or(1, |n| n.get()),
            thread_name: "contseq-worker".to_string(),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// A fixed pool of worker threads fed through an unbounded channel.
///
/// Dropping the pool closes the channel and joins the workers once they have
/// run every job already queued.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start the pool described by `config`.
    pub fn new(config: PoolConfig) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let count = config.workers.max(1);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || work(receiver))?;
            workers.push(handle);
        }
        tracing::debug!(workers = count, name = %config.thread_name, "worker pool started");
        Ok(WorkerPool {
            sender: Some(sender),
            workers,
        })
    }

    /// Start a pool of `workers` threads with default naming.
    pub fn with_workers(workers: usize) -> std::io::Result<Self> {
        Self::new(PoolConfig::default().with_workers(workers))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

fn work(jobs: Receiver<Job>) {
    for job in jobs.iter() {
        job();
    }
}

impl WorkQueue for WorkerPool {
    fn enqueue(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(job).is_err() {
            tracing::warn!("worker pool channel closed; job dropped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        // A job may hold the last handle to its own pool; never join ourselves.
        let current: ThreadId = thread::current().id();
        for handle in self.workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
