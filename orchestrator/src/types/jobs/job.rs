use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::types::{JobId, JobStatus};
use crate::types::AccountId;

/// Immutable audit record appended to a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobLog {
    pub action: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Side channel result published by a task for later steps or consumers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobValue {
    pub key: String,
    pub key_idx: u64,
    pub value: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub account_id: AccountId,
    pub description: String,
    pub status: JobStatus,
    pub task_status: BTreeMap<String, JobStatus>,
    pub logs: Vec<JobLog>,
    pub values: BTreeMap<String, JobValue>,
    pub created_at: DateTime<Utc>,
    /// Bumped by the repository on every update
    pub version: u64,
}

impl Job {
    pub fn new(account_id: AccountId, description: impl Into<String>) -> Self {
        Self::with_id(JobId::new(), account_id, description)
    }

    pub fn with_id(id: JobId, account_id: AccountId, description: impl Into<String>) -> Self {
        Self {
            id,
            account_id,
            description: description.into(),
            status: JobStatus::Pending,
            task_status: BTreeMap::new(),
            logs: Vec::new(),
            values: BTreeMap::new(),
            created_at: Utc::now().round_subsecs(3),
            version: 0,
        }
    }

    pub fn push_log(&mut self, action: impl Into<String>, message: impl Into<String>) {
        self.logs.push(JobLog {
            action: action.into(),
            message: message.into(),
            created_at: Utc::now().round_subsecs(3),
        });
    }

    pub fn last_log(&self) -> Option<&JobLog> {
        self.logs.last()
    }

    pub fn set_value(&mut self, value: JobValue) {
        self.values.insert(value.key.clone(), value);
    }

    pub fn is_successful(&self) -> bool {
        self.status == JobStatus::Success
    }

    pub fn status_view(&self) -> JobStatusView {
        let (message, last_updated) = match self.last_log() {
            Some(log) => (log.message.clone(), log.created_at),
            None => (String::new(), self.created_at),
        };
        JobStatusView { job_id: self.id, status: self.status, message, last_updated }
    }
}

/// Read only projection served to status queries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
    pub last_updated: DateTime<Utc>,
}
