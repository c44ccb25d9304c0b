//! Fixed-size worker pool
//!
//! Tasks are pulled from a shared `crossbeam` channel in FIFO order by
//! whichever worker is free first.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use thiserror::Error;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Returned by [`ThreadPool::execute`] once the pool is shutting down
#[derive(Debug, Error)]
#[error("Thread pool is shut down")]
pub struct PoolClosed;

/// Simple thread pool for parallel execution
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Task>>,
}

impl ThreadPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> io::Result<Self> {
        let (sender, receiver) = unbounded();

        let size = size.max(1);
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, receiver.clone())?);
        }

        log::debug!("Started thread pool with {} workers", size);
        Ok(Self {
            workers,
            sender: Some(sender),
        })
    }

    /// Queue a task
    pub fn execute<F>(&self, f: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolClosed)?;
        sender.send(Box::new(f)).map_err(|_| PoolClosed)
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Workers exit once the queue is drained and the sender is gone
        drop(self.sender.take());

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // The last handle can be released from inside a task; never self-join
            if worker.thread.thread().id() == current {
                continue;
            }
            if worker.thread.join().is_err() {
                log::error!("Worker {} exited abnormally", worker.id);
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Task>) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("mesher-worker-{id}"))
            .spawn(move || {
                for task in receiver.iter() {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        log::error!("Task panicked on worker {}", id);
                    }
                }
                log::trace!("Worker {} shutting down", id);
            })?;

        Ok(Self { id, thread })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_executes_all_tasks_before_drop_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(4).unwrap();
            assert_eq!(pool.size(), 4);
            for _ in 0..100 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_zero_size_gets_one_worker() {
        let pool = ThreadPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(1).unwrap();
            pool.execute(|| panic!("boom")).unwrap();
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
