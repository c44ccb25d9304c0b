//! Job scheduling and completion tracking
//!
//! [`JobScheduler`] runs closures on a [`ThreadPool`], records the status of
//! every job in a concurrent table and exposes two ways to learn when all of
//! them have finished: the blocking [`JobScheduler::wait`] and the
//! callback-based [`JobScheduler::notify`].
//!
//! Job failures never propagate. A job returning an error, or panicking, is
//! recorded as [`JobStatus::Errored`] and logged; the load continues.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use super::group::JobGroup;
use super::thread_pool::ThreadPool;

/// Outcome of a job body
pub type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Lifecycle of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued, not yet picked up by a worker
    Added,
    /// Running on a worker
    Started,
    /// Finished successfully
    Completed,
    /// Finished with an error or a panic
    Errored(String),
}

impl JobStatus {
    /// True for `Completed` and `Errored`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored(_))
    }
}

/// Aggregate job counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Jobs not yet started
    pub added: usize,
    /// Jobs currently running
    pub started: usize,
    /// Jobs finished successfully
    pub completed: usize,
    /// Jobs finished with an error
    pub errored: usize,
}

impl JobSummary {
    /// Total number of jobs
    pub fn total(&self) -> usize {
        self.added + self.started + self.completed + self.errored
    }

    /// True when every job reached a terminal status
    pub fn is_settled(&self) -> bool {
        self.added == 0 && self.started == 0
    }
}

struct Shared {
    jobs: RwLock<HashMap<String, JobStatus>>,
    group: JobGroup,
}

impl Shared {
    fn set_status(&self, id: &str, status: JobStatus) {
        log::trace!("Job {} -> {:?}", id, status);
        self.jobs.write().insert(id.to_string(), status);
    }

    fn run<F>(&self, id: &str, work: F)
    where
        F: FnOnce() -> JobResult,
    {
        self.set_status(id, JobStatus::Started);

        let status = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => JobStatus::Completed,
            Ok(Err(err)) => {
                log::warn!("Job {} failed: {}", id, err);
                JobStatus::Errored(err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Job {} panicked: {}", id, message);
                JobStatus::Errored(format!("panicked: {message}"))
            }
        };
        self.set_status(id, status);

        for completion in self.group.leave() {
            completion();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs jobs on a worker pool and tracks their completion
pub struct JobScheduler {
    shared: Arc<Shared>,
    pool: ThreadPool,
}

impl JobScheduler {
    /// Create a scheduler backed by `worker_threads` workers
    pub fn new(worker_threads: usize) -> io::Result<Self> {
        Ok(Self {
            shared: Arc::new(Shared {
                jobs: RwLock::new(HashMap::new()),
                group: JobGroup::new(),
            }),
            pool: ThreadPool::new(worker_threads)?,
        })
    }

    /// Register a job and schedule it immediately
    ///
    /// Jobs start in the order they are added. Ids are expected to be unique;
    /// reusing one replaces the earlier status entry.
    pub fn add<F>(&self, id: impl Into<String>, work: F)
    where
        F: FnOnce() -> JobResult + Send + 'static,
    {
        let id = id.into();
        if self.shared.jobs.read().contains_key(&id) {
            log::warn!("Job id {} reused", id);
        }
        self.shared.set_status(&id, JobStatus::Added);
        self.shared.group.enter();

        let shared = Arc::clone(&self.shared);
        let task_id = id.clone();
        if self
            .pool
            .execute(move || shared.run(&task_id, work))
            .is_err()
        {
            log::error!("Job {} could not be queued", id);
            self.shared
                .set_status(&id, JobStatus::Errored("worker pool closed".to_string()));
            for completion in self.shared.group.leave() {
                completion();
            }
        }
    }

    /// Block until every added job has finished
    pub fn wait(&self) {
        self.shared.group.wait();
    }

    /// Run `callback` once on a worker thread when every added job has finished
    ///
    /// Dispatched right away when nothing is outstanding.
    pub fn notify<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(callback) = self.shared.group.notify(Box::new(callback)) {
            if self.pool.execute(callback).is_err() {
                log::error!("Completion callback could not be queued");
            }
        }
    }

    /// Current status of a job
    pub fn status(&self, id: &str) -> Option<JobStatus> {
        self.shared.jobs.read().get(id).cloned()
    }

    /// Job counts by status
    pub fn summary(&self) -> JobSummary {
        self.shared
            .jobs
            .read()
            .values()
            .fold(JobSummary::default(), |mut summary, status| {
                match status {
                    JobStatus::Added => summary.added += 1,
                    JobStatus::Started => summary.started += 1,
                    JobStatus::Completed => summary.completed += 1,
                    JobStatus::Errored(_) => summary.errored += 1,
                }
                summary
            })
    }

    /// Number of jobs ever added
    pub fn job_count(&self) -> usize {
        self.shared.jobs.read().len()
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }
}
