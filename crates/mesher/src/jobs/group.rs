//! Job-count barrier
//!
//! Counts outstanding jobs. Waiters block until the count drops to zero and
//! completion callbacks fire once on that transition.

use parking_lot::{Condvar, Mutex};

/// Callback fired when a group drains
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct GroupState {
    pending: usize,
    completions: Vec<Completion>,
}

/// Job-count barrier with blocking and callback completion
#[derive(Default)]
pub struct JobGroup {
    state: Mutex<GroupState>,
    drained: Condvar,
}

impl JobGroup {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one outstanding job
    pub fn enter(&self) {
        self.state.lock().pending += 1;
    }

    /// Mark one job finished
    ///
    /// Returns the completion callbacks to run when this was the last
    /// outstanding job. The caller runs them after the lock is released.
    #[must_use]
    pub fn leave(&self) -> Vec<Completion> {
        let mut state = self.state.lock();
        if state.pending == 0 {
            log::warn!("Job group left more often than entered");
            return Vec::new();
        }

        state.pending -= 1;
        if state.pending > 0 {
            return Vec::new();
        }

        self.drained.notify_all();
        std::mem::take(&mut state.completions)
    }

    /// Block until no job is outstanding
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.pending > 0 {
            self.drained.wait(&mut state);
        }
    }

    /// Register a completion callback
    ///
    /// Hands the callback back when the group is already drained so the
    /// caller can dispatch it right away.
    #[must_use]
    pub fn notify(&self, completion: Completion) -> Option<Completion> {
        let mut state = self.state.lock();
        if state.pending == 0 {
            return Some(completion);
        }
        state.completions.push(completion);
        None
    }

    /// Outstanding job count
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }
}
