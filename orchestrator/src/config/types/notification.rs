use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notifications are disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<Url>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { webhook_url: None, timeout_seconds: default_timeout_seconds() }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
