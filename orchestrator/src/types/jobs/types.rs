use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::error::job::JobError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    /// The job was created and its work has not reported an outcome yet
    Pending,
    /// The work finished successfully
    Success,
    /// The work failed, the last log entry carries the reason
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    /// Only `Pending` may move, and only to a terminal status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(self, JobStatus::Pending) && next.is_terminal()
    }
}

/// Job identifier, rendered as `0x` followed by 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl FromStr for JobId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || JobError::InvalidId { id: s.to_string() };
        let raw = s.strip_prefix("0x").ok_or_else(invalid)?;
        let bytes: [u8; 16] = hex::decode(raw).map_err(|_| invalid())?.try_into().map_err(|_| invalid())?;
        Ok(Self(Uuid::from_bytes(bytes)))
    }
}

impl TryFrom<String> for JobId {
    type Error = JobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}
