pub mod job;
pub mod task;

use thiserror::Error;

use crate::core::client::database::DatabaseError;
use crate::core::client::notification::NotificationError;
pub use job::JobError;
pub use task::{ChainBuildError, ParamError, TaskError};

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Error types for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Notification error: {0}")]
    NotificationError(#[from] NotificationError),

    #[error("Job error: {0}")]
    JobError(#[from] JobError),

    #[error("Task error: {0}")]
    TaskError(#[from] TaskError),

    #[error("Task chain error: {0}")]
    ChainBuildError(#[from] ChainBuildError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Setup error: {0}")]
    SetupError(String),

    #[error("Orchestrator Error: {0}")]
    OrchestratorAnyHowError(#[from] anyhow::Error),
}
