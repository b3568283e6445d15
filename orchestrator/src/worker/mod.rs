pub mod service;
pub mod task_chain;
pub mod tasks;
pub mod workflows;

pub use service::{JobContext, JobHandle, JobManager, JobService, JobWork};
