//! Fan-out of per-file work over a fixed set of worker threads.
//!
//! Every worker owns one session (an exiftool process in production) for the
//! whole batch. The producer pushes the sorted paths into a bounded
//! [`WorkQueue`] and then sets the [`CompletionSignal`]. Workers poll the
//! queue with a short timeout and leave once the signal is set and one more
//! drain attempt comes back empty.
//!
//! A worker whose session dies reopens it once and retries the item. If that
//! fails too, the item goes back to the front of the queue and the worker
//! retires, leaving the rest of the batch to the others.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY};
use crate::queue::{CompletionSignal, WorkItem, WorkQueue};

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distributor {
    pub workers: usize,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
}

/// Items handled by each worker, indexed by worker id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    pub per_worker: Vec<usize>,
}

impl DistributionReport {
    pub fn total(&self) -> usize {
        self.per_worker.iter().sum()
    }
}

/// What a job reports back to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The item is finished, whether or not it succeeded.
    Done,
    /// The session is unusable and the item was not handled.
    SessionLost,
}

/// State shared by the producer and all workers.
struct Pool {
    queue: WorkQueue,
    done: CompletionSignal,
    live: AtomicUsize,
    poll_interval: Duration,
}

impl Pool {
    /// Pushes `path`, giving up once no worker is left to take it.
    fn feed(&self, mut path: PathBuf) -> bool {
        loop {
            if self.live.load(Ordering::SeqCst) == 0 {
                return false;
            }
            match self.queue.push_timeout(path, self.poll_interval) {
                Ok(_) => return true,
                Err(back) => path = back,
            }
        }
    }

    fn next_item(&self) -> Option<WorkItem> {
        loop {
            if let Some(item) = self.queue.pop_timeout(self.poll_interval) {
                return Some(item);
            }
            if self.done.is_set() {
                // The producer may have pushed its last item between the
                // timed-out pop and the flag check.
                return self.queue.try_pop();
            }
        }
    }
}

impl Distributor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Processes every path exactly once.
    ///
    /// `open` is called once per worker before any thread starts, so a
    /// session that cannot be opened fails the batch up front. It is called
    /// again from a worker whose session was lost. `job` runs for each
    /// dequeued item with the worker's own session. Sessions are dropped
    /// when their worker exits.
    ///
    /// Fails if items are left over because workers lost their sessions.
    pub fn run<S, O, J>(
        &self,
        mut paths: Vec<PathBuf>,
        open: O,
        job: J,
    ) -> Result<DistributionReport>
    where
        S: Send,
        O: Fn(usize) -> Result<S> + Sync,
        J: Fn(&mut S, &WorkItem) -> JobOutcome + Sync,
    {
        paths.sort();

        let sessions = (0..self.workers)
            .map(|id| {
                open(id).with_context(|| format!("Failed to open session for worker {id}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let pool = Pool {
            queue: WorkQueue::new(self.queue_capacity),
            done: CompletionSignal::new(),
            live: AtomicUsize::new(sessions.len()),
            poll_interval: self.poll_interval,
        };
        let total = paths.len();

        info!("Distributing {} files over {} workers", total, self.workers);

        let (per_worker, unqueued) = thread::scope(|scope| -> Result<(Vec<usize>, usize)> {
            let mut handles = Vec::with_capacity(sessions.len());
            let mut spawn_error = None;

            for (id, session) in sessions.into_iter().enumerate() {
                let (pool, open, job) = (&pool, &open, &job);

                let spawned = thread::Builder::new()
                    .name(format!("geotag-worker-{id}"))
                    .spawn_scoped(scope, move || worker_loop(id, session, pool, open, job));

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        spawn_error = Some(e);
                        break;
                    }
                }
            }

            let mut unqueued = 0;
            if spawn_error.is_none() {
                for (pushed, path) in paths.into_iter().enumerate() {
                    if !pool.feed(path) {
                        unqueued = total - pushed;
                        break;
                    }
                }
            }
            pool.done.set();

            let counts = handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect();

            match spawn_error {
                Some(e) => Err(e).context("Failed to spawn worker thread"),
                None => Ok((counts, unqueued)),
            }
        })?;

        let report = DistributionReport { per_worker };
        debug!("Worker item counts: {:?}", report.per_worker);

        let leftover = pool.queue.len() + unqueued;
        if leftover > 0 {
            bail!(
                "{} of {} files were not processed after workers lost their sessions",
                leftover,
                total
            );
        }
        Ok(report)
    }
}

fn worker_loop<S, O, J>(id: usize, mut session: S, pool: &Pool, open: &O, job: &J) -> usize
where
    O: Fn(usize) -> Result<S>,
    J: Fn(&mut S, &WorkItem) -> JobOutcome,
{
    let mut handled = 0;

    while let Some(item) = pool.next_item() {
        if job(&mut session, &item) == JobOutcome::Done {
            handled += 1;
            continue;
        }

        warn!("Worker {} lost its session at {:?}, reopening", id, item.path);
        let retried = match open(id) {
            Ok(fresh) => {
                session = fresh;
                job(&mut session, &item)
            }
            Err(e) => {
                warn!("Worker {} could not reopen its session: {:#}", id, e);
                JobOutcome::SessionLost
            }
        };
        if retried == JobOutcome::Done {
            handled += 1;
            continue;
        }

        let remaining = pool.live.fetch_sub(1, Ordering::SeqCst) - 1;
        pool.queue.requeue(item);
        warn!("Worker {} retired, {} workers remain", id, remaining);
        break;
    }

    debug!("Worker {} finished after {} items", id, handled);
    handled
}
