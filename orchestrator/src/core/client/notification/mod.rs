pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use webhook::WebhookSender;

use crate::types::jobs::{JobId, JobStatus};
use crate::types::AccountId;

/// Document type carried by job completion notifications.
pub const JOB_DOCUMENT_TYPE: &str = "http://github.com/centrifuge/go-centrifuge/jobs/#Job";

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    #[error("Webhook responded with status {status}")]
    UnexpectedStatus { status: u16 },
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::SendFailed(err.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    JobCompleted,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub event_type: EventType,
    pub account_id: AccountId,
    pub recorded: DateTime<Utc>,
    pub document_type: String,
    pub document_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

impl NotificationMessage {
    pub fn job_completed(account_id: AccountId, job_id: JobId, status: JobStatus, message: String) -> Self {
        Self {
            event_type: EventType::JobCompleted,
            account_id,
            recorded: Utc::now(),
            document_type: JOB_DOCUMENT_TYPE.to_string(),
            document_id: job_id,
            status,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Sent,
    /// No receiver configured
    Disabled,
}

/// Sends job lifecycle notifications to the account owner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: NotificationMessage) -> Result<NotificationStatus, NotificationError>;
}
