use anchor_ethereum_submitter::EthereumError;
use anchor_substrate_submitter::SubstrateError;
use thiserror::Error;

use super::job::JobError;
use crate::core::client::database::DatabaseError;

/// Decoding failure of an untyped task parameter map. Always names the offending key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("undefined kwarg {key}")]
    Missing { key: String },

    #[error("malformed kwarg [{key}]: {reason}")]
    Malformed { key: String, reason: String },

    #[error("unknown task {0}")]
    UnknownTask(String),
}

impl ParamError {
    pub fn missing(key: &str) -> Self {
        Self::Missing { key: key.to_string() }
    }

    pub fn malformed(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::Malformed { key: key.to_string(), reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    /// Not done yet, the task or step is re-invoked later.
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    Failed(String),

    #[error("missing override {key}")]
    MissingOverride { key: String },

    #[error("malformed override {key}: {reason}")]
    MalformedOverride { key: String, reason: String },

    #[error("step {step} gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { step: String, attempts: u32, last_error: String },

    #[error("task {task} timed out")]
    Timeout { task: String },

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Ethereum(#[from] EthereumError),

    #[error(transparent)]
    Substrate(#[from] SubstrateError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether the error only means "not yet", never a terminal failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Retryable(_) => true,
            Self::Substrate(SubstrateError::BlockNotReady) => true,
            _ => false,
        }
    }
}

/// Structural problem in a task chain definition, caught before any step runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainBuildError {
    #[error("task chain {chain} has no steps")]
    Empty { chain: String },

    #[error("step {step} is registered twice")]
    DuplicateStep { step: String },

    #[error("task chain {chain} must have exactly one initial step, found {found:?}")]
    InitialStep { chain: String, found: Vec<String> },

    #[error("step {step} names unknown next step {next}")]
    UnknownNext { step: String, next: String },

    #[error("step {step} is part of a cycle or unreachable")]
    Cycle { step: String },

    #[error("step {step} reads override {key} that no earlier step writes")]
    UnsatisfiedRead { step: String, key: String },
}
