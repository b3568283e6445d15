use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::client::database::constant::JOBS_KEY_PREFIX;
use crate::core::client::database::{DatabaseError, KeyValueStore};
use crate::types::jobs::{Job, JobId};
use crate::types::AccountId;

/// Persistence of jobs, scoped by account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// create_job - Persist a new job, failing if the id is already taken for the account
    async fn create_job(&self, job: Job) -> Result<Job, DatabaseError>;

    /// get_job - Load a job by account and id
    async fn get_job(&self, account: &AccountId, id: &JobId) -> Result<Option<Job>, DatabaseError>;

    /// job_exists - Whether a job is stored for the account
    async fn job_exists(&self, account: &AccountId, id: &JobId) -> Result<bool, DatabaseError>;

    /// update_job - Store `job` if nobody updated it since it was read. Returns the stored job with its
    /// version bumped.
    async fn update_job(&self, job: &Job) -> Result<Job, DatabaseError>;

    /// list_jobs - All jobs of an account
    async fn list_jobs(&self, account: &AccountId) -> Result<Vec<Job>, DatabaseError>;
}

/// [`JobRepository`] over any [`KeyValueStore`], storing jobs as JSON.
pub struct KvJobRepository {
    store: Arc<dyn KeyValueStore>,
}

impl KvJobRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn account_prefix(account: &AccountId) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(JOBS_KEY_PREFIX.len() + 20);
        prefix.extend_from_slice(JOBS_KEY_PREFIX);
        prefix.extend_from_slice(account.as_bytes());
        prefix
    }

    pub fn job_key(account: &AccountId, id: &JobId) -> Vec<u8> {
        let mut key = Self::account_prefix(account);
        key.extend_from_slice(id.as_bytes());
        key
    }
}

#[async_trait]
impl JobRepository for KvJobRepository {
    async fn create_job(&self, job: Job) -> Result<Job, DatabaseError> {
        let key = Self::job_key(&job.account_id, &job.id);
        self.store.create(&key, serde_json::to_vec(&job)?).map_err(|e| match e {
            DatabaseError::ItemAlreadyExists(_) => {
                DatabaseError::ItemAlreadyExists(format!("Job already exists: {}", job.id))
            }
            other => other,
        })?;
        debug!(job_id = %job.id, account = %job.account_id, "Job created");
        Ok(job)
    }

    async fn get_job(&self, account: &AccountId, id: &JobId) -> Result<Option<Job>, DatabaseError> {
        match self.store.get(&Self::job_key(account, id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn job_exists(&self, account: &AccountId, id: &JobId) -> Result<bool, DatabaseError> {
        self.store.exists(&Self::job_key(account, id))
    }

    async fn update_job(&self, job: &Job) -> Result<Job, DatabaseError> {
        let key = Self::job_key(&job.account_id, &job.id);
        let current_raw =
            self.store.get(&key)?.ok_or_else(|| DatabaseError::NotFound(format!("Job not found: {}", job.id)))?;
        let current: Job = serde_json::from_slice(&current_raw)?;

        let version_mismatch = || {
            warn!(
                job_id = %job.id,
                version = job.version,
                stored_version = current.version,
                "Update failed - version mismatch"
            );
            DatabaseError::UpdateFailed(format!("Job {} version mismatch", job.id))
        };
        if current.version != job.version {
            return Err(version_mismatch());
        }

        let mut updated = job.clone();
        updated.version = job.version + 1;
        if !self.store.compare_and_swap(&key, &current_raw, serde_json::to_vec(&updated)?)? {
            return Err(version_mismatch());
        }
        Ok(updated)
    }

    async fn list_jobs(&self, account: &AccountId) -> Result<Vec<Job>, DatabaseError> {
        self.store
            .scan_prefix(&Self::account_prefix(account))?
            .into_iter()
            .map(|(_, raw)| serde_json::from_slice(&raw).map_err(DatabaseError::from))
            .collect()
    }
}
