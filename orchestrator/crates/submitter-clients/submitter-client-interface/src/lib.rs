pub mod cache;
pub mod lock;

use std::time::Duration;

use mockall::automock;
use serde::{Deserialize, Serialize};

pub use cache::{AccountCache, CacheConfig};
pub use lock::AccountLocks;

/// Message carried by every submitter once the retry budget is spent.
pub const MAX_RETRIES_REACHED: &str = "max concurrent transaction tries reached";

/// Retry budget applied to a single submission.
///
/// Shared by both chain submitters so the same configuration knobs govern nonce collision handling
/// everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of submission attempts, the first one included.
    pub max_retries: u32,

    /// Delay in milliseconds between two attempts.
    pub retry_interval_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_interval: Duration) -> Self {
        Self { max_retries, retry_interval_ms: retry_interval.as_millis() as u64 }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn attempts(&self) -> Attempts {
        Attempts { current: 0, max: self.max_retries }
    }
}

/// Source of the retry policy, consulted at the start of every submission.
#[automock]
pub trait RetryPolicyProvider: Send + Sync {
    fn retry_policy(&self) -> RetryPolicy;
}

impl RetryPolicyProvider for RetryPolicy {
    fn retry_policy(&self) -> RetryPolicy {
        *self
    }
}

/// Attempt counter bounded by [`RetryPolicy::max_retries`].
#[derive(Debug, Clone)]
pub struct Attempts {
    current: u32,
    max: u32,
}

impl Attempts {
    /// Returns the 1-based number of the next attempt, or `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.current >= self.max {
            return None;
        }
        self.current += 1;
        Some(self.current)
    }

    pub fn used(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}
