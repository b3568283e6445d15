use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::chain::TaskChain;
use super::overrides::Overrides;
use crate::config::StepPolicyConfig;
use crate::error::TaskError;
use crate::types::jobs::{JobId, JobStatus};
use crate::types::AccountId;
use crate::worker::service::JobManager;

/// Job value key under which the run state is persisted after every step.
pub const CHAIN_RUN_KEY: &str = "task_chain_run";

/// How failing steps and tasks are retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepPolicy {
    /// `None` retries until the step succeeds
    pub max_attempts: Option<u32>,
    pub retry_interval: Duration,
    /// Errors other than [`TaskError::Retryable`] end the chain at once
    pub fail_fast: bool,
}

impl StepPolicy {
    /// Whether a step that failed `attempts` times with `error` is given up on.
    pub fn gives_up(&self, attempts: u32, error: &TaskError) -> bool {
        (self.fail_fast && !error.is_retryable()) || self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl From<&StepPolicyConfig> for StepPolicy {
    fn from(config: &StepPolicyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_interval: Duration::from_millis(config.retry_interval_ms),
            fail_fast: config.fail_fast,
        }
    }
}

/// Persisted position of one chain instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChainRun {
    pub chain: String,
    /// Step to run next. `None` once the chain completed.
    pub step: Option<String>,
    /// Failed attempts of the current step
    pub attempts: u32,
    pub overrides: Overrides,
}

impl ChainRun {
    pub fn new<A>(chain: &TaskChain<A>) -> Self {
        Self {
            chain: chain.name().to_string(),
            step: Some(chain.initial().to_string()),
            attempts: 0,
            overrides: Overrides::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.step.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { next: String },
    Completed,
    /// The step stays current and is run again later.
    Retry { step: String, attempt: u32, reason: String },
}

/// Runs a [`TaskChain`] under a job, one step at a time.
pub struct ChainRunner<A> {
    chain: Arc<TaskChain<A>>,
    jobs: Arc<dyn JobManager>,
    policy: StepPolicy,
}

impl<A> ChainRunner<A>
where
    A: Send + Sync,
{
    pub fn new(chain: Arc<TaskChain<A>>, jobs: Arc<dyn JobManager>, policy: StepPolicy) -> Self {
        Self { chain, jobs, policy }
    }

    pub fn chain(&self) -> &TaskChain<A> {
        &self.chain
    }

    /// Runs the current step once and records its status on the job.
    ///
    /// Overrides written by a failed attempt are discarded.
    pub async fn run_step(
        &self,
        account: &AccountId,
        job_id: &JobId,
        args: &A,
        run: &mut ChainRun,
    ) -> Result<StepOutcome, TaskError> {
        let Some(name) = run.step.clone() else {
            return Ok(StepOutcome::Completed);
        };
        let step = self
            .chain
            .step(&name)
            .ok_or_else(|| TaskError::failed(format!("unknown step {name} in task chain {}", self.chain.name())))?;

        tracing::debug!(
            job_id = %job_id,
            chain = %run.chain,
            step = %name,
            attempt = run.attempts + 1,
            "Running task chain step"
        );

        let mut overrides = run.overrides.clone();
        match step.run(args, &mut overrides).await {
            Ok(()) => {
                run.overrides = overrides;
                run.attempts = 0;
                run.step = self.chain.next(&name).map(String::from);
                self.jobs.update_task_status(account, job_id, JobStatus::Success, &name, "step completed").await?;
                self.persist(account, job_id, run).await?;

                match &run.step {
                    Some(next) => {
                        tracing::info!(job_id = %job_id, step = %name, next = %next, "Task chain step completed");
                        Ok(StepOutcome::Advanced { next: next.clone() })
                    }
                    None => {
                        tracing::info!(job_id = %job_id, chain = %run.chain, "Task chain completed");
                        Ok(StepOutcome::Completed)
                    }
                }
            }
            Err(error) => {
                run.attempts += 1;
                let attempt = run.attempts;
                let message = error.to_string();

                if self.policy.gives_up(attempt, &error) {
                    tracing::error!(
                        job_id = %job_id,
                        step = %name,
                        attempt,
                        error = %message,
                        "Task chain step failed"
                    );
                    self.jobs.update_task_status(account, job_id, JobStatus::Failed, &name, &message).await?;
                    self.persist(account, job_id, run).await?;

                    return Err(match self.policy.max_attempts {
                        Some(max) if attempt >= max => {
                            TaskError::RetriesExhausted { step: name, attempts: attempt, last_error: message }
                        }
                        _ => error,
                    });
                }

                tracing::warn!(
                    job_id = %job_id,
                    step = %name,
                    attempt,
                    max_attempts = ?self.policy.max_attempts,
                    reason = %message,
                    "Task chain step not done yet"
                );
                self.jobs.update_task_status(account, job_id, JobStatus::Pending, &name, &message).await?;
                self.persist(account, job_id, run).await?;
                Ok(StepOutcome::Retry { step: name, attempt, reason: message })
            }
        }
    }

    /// Runs steps until the chain completes or a step gives up, sleeping between retries.
    pub async fn drive(
        &self,
        account: &AccountId,
        job_id: &JobId,
        args: &A,
        run: &mut ChainRun,
    ) -> Result<(), TaskError> {
        loop {
            match self.run_step(account, job_id, args, run).await? {
                StepOutcome::Advanced { .. } => continue,
                StepOutcome::Completed => return Ok(()),
                StepOutcome::Retry { .. } => tokio::time::sleep(self.policy.retry_interval).await,
            }
        }
    }

    /// Starts a fresh run at the initial step and drives it to the end.
    pub async fn start(&self, account: &AccountId, job_id: &JobId, args: &A) -> Result<ChainRun, TaskError> {
        let mut run = ChainRun::new(&self.chain);
        self.persist(account, job_id, &run).await?;
        self.drive(account, job_id, args, &mut run).await?;
        Ok(run)
    }

    /// Continues a persisted run at its recorded step. Completed steps are not run again.
    pub async fn resume(&self, account: &AccountId, job_id: &JobId, args: &A) -> Result<ChainRun, TaskError> {
        let mut run = self.load(account, job_id).await?;
        tracing::info!(job_id = %job_id, chain = %run.chain, step = ?run.step, "Resuming task chain");
        self.drive(account, job_id, args, &mut run).await?;
        Ok(run)
    }

    /// Runs only the recorded step of a persisted run, for callers that re-invoke the chain themselves.
    pub async fn dispatch(&self, account: &AccountId, job_id: &JobId, args: &A) -> Result<StepOutcome, TaskError> {
        let mut run = self.load(account, job_id).await?;
        self.run_step(account, job_id, args, &mut run).await
    }

    pub async fn load(&self, account: &AccountId, job_id: &JobId) -> Result<ChainRun, TaskError> {
        let job = self.jobs.get_job(account, job_id).await?;
        let value = job
            .values
            .get(CHAIN_RUN_KEY)
            .ok_or_else(|| TaskError::failed(format!("no task chain run recorded for job {job_id}")))?;
        let run: ChainRun = serde_json::from_slice(&value.value)
            .map_err(|e| TaskError::failed(format!("corrupt task chain run for job {job_id}: {e}")))?;
        if run.chain != self.chain.name() {
            return Err(TaskError::failed(format!(
                "job {job_id} runs task chain {}, not {}",
                run.chain,
                self.chain.name()
            )));
        }
        Ok(run)
    }

    async fn persist(&self, account: &AccountId, job_id: &JobId, run: &ChainRun) -> Result<(), TaskError> {
        let raw = serde_json::to_vec(run)
            .map_err(|e| TaskError::failed(format!("failed to encode task chain run: {e}")))?;
        self.jobs.update_job_with_value(account, job_id, CHAIN_RUN_KEY, raw).await?;
        Ok(())
    }
}
