pub mod job;
pub mod types;

pub use job::{Job, JobLog, JobStatusView, JobValue};
pub use types::{JobId, JobStatus};
