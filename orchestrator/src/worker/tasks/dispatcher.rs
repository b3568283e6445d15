use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use super::QueuedTask;
use crate::error::{ParamError, TaskError};
use crate::types::jobs::{JobStatus, JobValue};
use crate::types::params::TaskParams;
use crate::worker::service::JobManager;
use crate::worker::task_chain::StepPolicy;

/// Handle on an enqueued task.
#[derive(Debug)]
pub struct TaskResult {
    task: &'static str,
    handle: JoinHandle<Result<Option<JobValue>, TaskError>>,
}

impl TaskResult {
    pub fn task(&self) -> &'static str {
        self.task
    }

    /// Waits for the task outcome, at most `timeout`. The task keeps running after a timeout.
    pub async fn get(self, timeout: Duration) -> Result<Option<JobValue>, TaskError> {
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Err(TaskError::failed(format!("task {} aborted: {e}", self.task))),
            Err(_) => Err(TaskError::Timeout { task: self.task.to_string() }),
        }
    }
}

/// Registry of queued tasks, re-invoking them while they report "not yet".
pub struct TaskDispatcher {
    tasks: HashMap<&'static str, Arc<dyn QueuedTask>>,
    jobs: Arc<dyn JobManager>,
    policy: StepPolicy,
}

impl TaskDispatcher {
    pub fn new(jobs: Arc<dyn JobManager>, policy: StepPolicy) -> Self {
        Self { tasks: HashMap::new(), jobs, policy }
    }

    pub fn register(&mut self, task: Arc<dyn QueuedTask>) {
        tracing::debug!(task = task.name(), "Registering task");
        self.tasks.insert(task.name(), task);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Decodes untyped queue parameters once and enqueues the task.
    pub fn enqueue_kwargs(&self, task_name: &str, kwargs: &Map<String, Value>) -> Result<TaskResult, TaskError> {
        let params = TaskParams::from_kwargs(task_name, kwargs)?;
        self.enqueue(params)
    }

    pub fn enqueue(&self, params: TaskParams) -> Result<TaskResult, TaskError> {
        let task = self
            .tasks
            .get(params.task_name())
            .cloned()
            .ok_or_else(|| ParamError::UnknownTask(params.task_name().to_string()))?;
        let name = task.name();

        tracing::info!(task = name, job_id = %params.job_id(), account = %params.account_id(), "Task enqueued");
        let handle = tokio::spawn(run_task(task, self.jobs.clone(), self.policy, params));
        Ok(TaskResult { task: name, handle })
    }
}

async fn run_task(
    task: Arc<dyn QueuedTask>,
    jobs: Arc<dyn JobManager>,
    policy: StepPolicy,
    params: TaskParams,
) -> Result<Option<JobValue>, TaskError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let outcome = match task.run(&params).await {
            Err(e) if e.is_retryable() && policy.max_attempts.is_some_and(|max| attempts >= max) => {
                Err(TaskError::RetriesExhausted { step: task.name().to_string(), attempts, last_error: e.to_string() })
            }
            other => other,
        };
        record_outcome(jobs.as_ref(), task.name(), &params, &outcome).await;

        match outcome {
            Err(e) if e.is_retryable() => {
                tracing::debug!(
                    task = task.name(),
                    job_id = %params.job_id(),
                    attempt = attempts,
                    reason = %e,
                    "Task not done yet"
                );
                tokio::time::sleep(policy.retry_interval).await;
            }
            other => return other,
        }
    }
}

/// Mirrors a task invocation on the job: success with its value, pending while retryable, failed
/// otherwise. Recording problems are logged and never change the task outcome.
pub async fn record_outcome(
    jobs: &dyn JobManager,
    task_name: &str,
    params: &TaskParams,
    outcome: &Result<Option<JobValue>, TaskError>,
) {
    let account = params.account_id();
    let job_id = params.job_id();

    let recorded = match outcome {
        Ok(value) => {
            if let Some(value) = value {
                if let Err(e) = jobs.update_job_with_value(&account, &job_id, &value.key, value.value.clone()).await {
                    tracing::error!(task = task_name, job_id = %job_id, error = %e, "Failed to store task value");
                }
            }
            jobs.update_task_status(&account, &job_id, JobStatus::Success, task_name, "task completed").await
        }
        Err(e) if e.is_retryable() => {
            jobs.update_task_status(&account, &job_id, JobStatus::Pending, task_name, &e.to_string()).await
        }
        Err(e) => jobs.update_task_status(&account, &job_id, JobStatus::Failed, task_name, &e.to_string()).await,
    };

    if let Err(e) = recorded {
        tracing::error!(task = task_name, job_id = %job_id, error = %e, "Failed to record task status");
    }
}
