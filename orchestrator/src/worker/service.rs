use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::client::database::{DatabaseError, JobRepository};
use crate::core::client::notification::{NotificationMessage, NotificationSender};
use crate::core::client::JobLocks;
use crate::error::job::JobError;
use crate::types::jobs::{Job, JobId, JobStatus, JobStatusView, JobValue};
use crate::types::AccountId;

/// Log action prefix of entries written by the job supervisor
const MANAGER_LOG_PREFIX: &str = "manager";
const CONTEXT_CLOSED_ACTION: &str = "context closed";

/// Attempts of one read-modify-write cycle before a version conflict is surfaced
const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Identity handed to the work running under a job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub account_id: AccountId,
    pub job_id: JobId,
    /// Cancelled together with the supervisor. Work that ignores it keeps running after cancellation.
    pub cancellation: CancellationToken,
}

/// Asynchronous work executed under a job. Its result decides the job outcome.
pub type JobWork = Box<dyn FnOnce(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send>;

/// Returned by [`JobManager::execute_within_job`] before the work completes.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    /// Resolves once the outcome is persisted. Holds the job status at that point.
    pub done: oneshot::Receiver<JobStatus>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobManager: Send + Sync {
    /// Runs `work` under the job `existing_job_id` when it is stored, otherwise under a new pending job.
    ///
    /// Only new jobs are finalized from the work result and notified. A resumed job's outcome is
    /// governed by its task status updates.
    async fn execute_within_job(
        &self,
        account: AccountId,
        existing_job_id: Option<JobId>,
        description: String,
        work: JobWork,
        cancellation: CancellationToken,
    ) -> Result<JobHandle, JobError>;

    /// Overwrites `task_status[task_name]` and appends a log entry on every call.
    async fn update_task_status(
        &self,
        account: &AccountId,
        id: &JobId,
        status: JobStatus,
        task_name: &str,
        message: &str,
    ) -> Result<(), JobError>;

    async fn update_job_with_value(
        &self,
        account: &AccountId,
        id: &JobId,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), JobError>;

    async fn get_job(&self, account: &AccountId, id: &JobId) -> Result<Job, JobError>;

    async fn get_job_status(&self, account: &AccountId, id: &JobId) -> Result<JobStatusView, JobError>;

    /// Blocks until the job leaves `Pending`. A failed job yields `JobFailed` with its last log message.
    async fn wait_for_job(&self, account: &AccountId, id: &JobId) -> Result<(), JobError>;

    /// Records a terminal outcome decided by the caller, e.g. a resumed workflow.
    async fn finalize_job(
        &self,
        account: &AccountId,
        id: &JobId,
        status: JobStatus,
        message: &str,
    ) -> Result<Job, JobError>;

    async fn list_jobs(&self, account: &AccountId) -> Result<Vec<Job>, JobError>;

    fn default_task_timeout(&self) -> Duration;
}

/// [`JobManager`] backed by a [`JobRepository`].
#[derive(Clone)]
pub struct JobService {
    repo: Arc<dyn JobRepository>,
    locks: Arc<JobLocks>,
    notifier: Arc<dyn NotificationSender>,
    poll_interval: Duration,
    default_task_timeout: Duration,
}

impl JobService {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        notifier: Arc<dyn NotificationSender>,
        poll_interval: Duration,
        default_task_timeout: Duration,
    ) -> Self {
        Self { repo, locks: Arc::new(JobLocks::new()), notifier, poll_interval, default_task_timeout }
    }

    async fn load(&self, account: &AccountId, id: &JobId) -> Result<Job, JobError> {
        self.repo.get_job(account, id).await?.ok_or(JobError::JobNotFound { id: *id })
    }

    /// Applies `mutate` to a fresh copy of the job and stores it, under the job lock.
    ///
    /// A version conflict with another writer re-reads the job and applies `mutate` again.
    async fn mutate_job<F>(&self, account: &AccountId, id: &JobId, mut mutate: F) -> Result<Job, JobError>
    where
        F: FnMut(&mut Job) -> Result<(), JobError> + Send,
    {
        let guard = self.locks.lock(account, id).await;

        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            let mut job = match self.load(account, id).await {
                Ok(job) => job,
                Err(e) => break Err(e),
            };
            if let Err(e) = mutate(&mut job) {
                break Err(e);
            }
            match self.repo.update_job(&job).await {
                Ok(stored) => break Ok(stored),
                Err(DatabaseError::UpdateFailed(reason)) if attempt < MAX_UPDATE_ATTEMPTS => {
                    tracing::warn!(job_id = %id, attempt, reason = %reason, "Concurrent job update, retrying");
                }
                Err(e) => break Err(e.into()),
            }
        };

        drop(guard);
        self.locks.prune();
        result
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    /// Persists the work outcome. Returns `None` when the job could not be read back or stored.
    async fn record_outcome(
        &self,
        ctx: &JobContext,
        description: &str,
        is_new: bool,
        outcome: Result<(), JobError>,
    ) -> Option<Job> {
        let action = format!("{MANAGER_LOG_PREFIX}[{description}]");
        let result = self
            .mutate_job(&ctx.account_id, &ctx.job_id, |job| {
                match &outcome {
                    Ok(()) if is_new => set_terminal(job, JobStatus::Success),
                    Ok(()) => {}
                    Err(e) => {
                        job.push_log(action.clone(), e.to_string());
                        set_terminal(job, JobStatus::Failed);
                    }
                }
                Ok(())
            })
            .await;

        match result {
            Ok(job) => {
                tracing::info!(job_id = %job.id, account = %job.account_id, status = %job.status, "Job work finished");
                Some(job)
            }
            Err(e) => {
                tracing::error!(
                    job_id = %ctx.job_id,
                    outcome = ?outcome.err(),
                    error = %e,
                    "Failed to persist job outcome"
                );
                None
            }
        }
    }

    async fn record_cancellation(&self, ctx: &JobContext, description: &str) -> Option<Job> {
        let message = format!(
            "Job {} for account {} with description \"{}\" is stopped because of context close",
            ctx.job_id, ctx.account_id, description
        );
        tracing::warn!(job_id = %ctx.job_id, account = %ctx.account_id, "{}", message);

        match self.mutate_job(&ctx.account_id, &ctx.job_id, |job| {
            job.push_log(CONTEXT_CLOSED_ACTION, message.clone());
            Ok(())
        })
        .await
        {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::error!(job_id = %ctx.job_id, error = %e, "Failed to record job cancellation");
                None
            }
        }
    }

    async fn notify(&self, job: &Job) {
        let message = NotificationMessage::job_completed(
            job.account_id,
            job.id,
            job.status,
            job.last_log().map(|log| log.message.clone()).unwrap_or_default(),
        );
        match self.notifier.send(message).await {
            Ok(status) => tracing::debug!(job_id = %job.id, ?status, "Job notification handled"),
            Err(e) => tracing::error!(job_id = %job.id, error = %e, "Failed to send job notification"),
        }
    }

    /// Waits for the work or the cancellation, persists what happened, signals `done` and notifies.
    async fn supervise(
        self,
        ctx: JobContext,
        description: String,
        is_new: bool,
        work: JobWork,
        done: oneshot::Sender<JobStatus>,
    ) {
        let cancellation = ctx.cancellation.clone();
        let mut work = tokio::spawn(work(ctx.clone()));

        let job = tokio::select! {
            joined = &mut work => {
                let outcome = joined.unwrap_or_else(|e| Err(JobError::WorkPanicked(e.to_string())));
                self.record_outcome(&ctx, &description, is_new, outcome).await
            }
            _ = cancellation.cancelled() => self.record_cancellation(&ctx, &description).await,
        };

        let status = job.as_ref().map(|job| job.status).unwrap_or(JobStatus::Pending);
        if done.send(status).is_err() {
            tracing::debug!(job_id = %ctx.job_id, "Job completion receiver dropped");
        }

        if let Some(job) = job.filter(|_| is_new) {
            self.notify(&job).await;
        }
    }
}

fn set_terminal(job: &mut Job, status: JobStatus) {
    if job.status.can_transition_to(status) {
        job.status = status;
    } else {
        tracing::warn!(job_id = %job.id, from = %job.status, to = %status, "Job already finalized, keeping its status");
    }
}

#[async_trait]
impl JobManager for JobService {
    async fn execute_within_job(
        &self,
        account: AccountId,
        existing_job_id: Option<JobId>,
        description: String,
        work: JobWork,
        cancellation: CancellationToken,
    ) -> Result<JobHandle, JobError> {
        let existing = match existing_job_id {
            Some(id) => self.repo.get_job(&account, &id).await.unwrap_or_else(|e| {
                tracing::warn!(
                    job_id = %id,
                    account = %account,
                    error = %e,
                    "Existing job lookup failed, starting a new job"
                );
                None
            }),
            None => None,
        };

        let (job_id, is_new) = match existing {
            Some(job) => {
                tracing::info!(job_id = %job.id, account = %account, "Resuming work within existing job");
                (job.id, false)
            }
            None => {
                let job = self.repo.create_job(Job::new(account, description.clone())).await?;
                tracing::info!(job_id = %job.id, account = %account, description = %description, "Job created");
                (job.id, true)
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        let ctx = JobContext { account_id: account, job_id, cancellation };
        let span = tracing::info_span!("job", job_id = %job_id, account = %account);
        tokio::spawn(self.clone().supervise(ctx, description, is_new, work, done_tx).instrument(span));

        Ok(JobHandle { job_id, done: done_rx })
    }

    async fn update_task_status(
        &self,
        account: &AccountId,
        id: &JobId,
        status: JobStatus,
        task_name: &str,
        message: &str,
    ) -> Result<(), JobError> {
        self.mutate_job(account, id, |job| {
            job.task_status.insert(task_name.to_string(), status);
            job.push_log(task_name, message);
            Ok(())
        })
        .await?;
        tracing::debug!(job_id = %id, task = task_name, status = %status, "Task status updated");
        Ok(())
    }

    async fn update_job_with_value(
        &self,
        account: &AccountId,
        id: &JobId,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), JobError> {
        self.mutate_job(account, id, |job| {
            job.set_value(JobValue { key: key.to_string(), key_idx: 0, value: value.clone() });
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn get_job(&self, account: &AccountId, id: &JobId) -> Result<Job, JobError> {
        self.load(account, id).await
    }

    async fn get_job_status(&self, account: &AccountId, id: &JobId) -> Result<JobStatusView, JobError> {
        Ok(self.load(account, id).await?.status_view())
    }

    async fn wait_for_job(&self, account: &AccountId, id: &JobId) -> Result<(), JobError> {
        loop {
            let view = self.get_job_status(account, id).await?;
            match view.status {
                JobStatus::Success => return Ok(()),
                JobStatus::Failed => return Err(JobError::JobFailed(view.message)),
                JobStatus::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    async fn finalize_job(
        &self,
        account: &AccountId,
        id: &JobId,
        status: JobStatus,
        message: &str,
    ) -> Result<Job, JobError> {
        let job = self
            .mutate_job(account, id, |job| {
                if !job.status.can_transition_to(status) {
                    return Err(JobError::InvalidStatusTransition { id: job.id, from: job.status, to: status });
                }
                job.status = status;
                job.push_log(MANAGER_LOG_PREFIX, message);
                Ok(())
            })
            .await?;
        tracing::info!(job_id = %id, status = %status, "Job finalized");
        Ok(job)
    }

    async fn list_jobs(&self, account: &AccountId) -> Result<Vec<Job>, JobError> {
        Ok(self.repo.list_jobs(account).await?)
    }

    fn default_task_timeout(&self) -> Duration {
        self.default_task_timeout
    }
}
