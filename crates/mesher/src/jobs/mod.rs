//! Background job execution
//!
//! A worker pool, a job-count barrier and the scheduler that ties them
//! together with a status table.

pub mod group;
pub mod scheduler;
pub mod thread_pool;

pub use group::JobGroup;
pub use scheduler::{JobResult, JobScheduler, JobStatus, JobSummary};
pub use thread_pool::{PoolClosed, ThreadPool};
