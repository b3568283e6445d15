use thiserror::Error;

use crate::core::client::database::DatabaseError;
use crate::core::client::notification::NotificationError;
use crate::types::jobs::{JobId, JobStatus};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("missing job: {id}")]
    JobNotFound { id: JobId },

    #[error("invalid job ID: {id}")]
    InvalidId { id: String },

    #[error("invalid account ID: {id}")]
    InvalidAccountId { id: String },

    #[error("invalid status transition for job {id}: {from} -> {to}")]
    InvalidStatusTransition { id: JobId, from: JobStatus, to: JobStatus },

    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("job work panicked or was aborted: {0}")]
    WorkPanicked(String),

    #[error("job completion channel closed")]
    CompletionDropped,

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    /// Wraps any displayable error so that the job log keeps its message verbatim.
    pub fn other(err: impl std::fmt::Display) -> Self {
        Self::Other(anyhow::anyhow!("{err}"))
    }
}
