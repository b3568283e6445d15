use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Upper bound on a single queued task run
    #[serde(default = "default_task_timeout_seconds")]
    pub default_task_timeout_seconds: u64,

    /// Polling interval of `wait_for_job`
    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,

    #[serde(default)]
    pub step_policy: StepPolicyConfig,
}

/// Retry behavior of task chain steps and queued tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepPolicyConfig {
    /// Ceiling on attempts per step. Absent means retry until the step succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default)]
    pub retry_interval_ms: u64,

    /// Treat errors that are not explicitly retryable as terminal
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_task_timeout_seconds() -> u64 {
    3600
}

fn default_wait_poll_interval_ms() -> u64 {
    10
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_task_timeout_seconds: default_task_timeout_seconds(),
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
            step_policy: StepPolicyConfig::default(),
        }
    }
}

impl JobsConfig {
    pub fn default_task_timeout(&self) -> Duration {
        Duration::from_secs(self.default_task_timeout_seconds)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }
}
