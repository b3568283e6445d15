use anchor_submitter_client_interface::{CacheConfig, RetryPolicy, RetryPolicyProvider};
use serde::{Deserialize, Serialize};
use url::Url;

/// Chain A connection and submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumConfig {
    pub rpc_url: Url,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Whether the node exposes `txpool_inspect`. Without it nonces come from the chain and the local cache.
    #[serde(default = "default_txpool_access")]
    pub txpool_access_enabled: bool,

    #[serde(default)]
    pub nonce_cache: CacheConfig,
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_interval_ms() -> u64 {
    2000
}

fn default_txpool_access() -> bool {
    true
}

impl EthereumConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            txpool_access_enabled: default_txpool_access(),
            nonce_cache: CacheConfig::default(),
        }
    }
}

impl RetryPolicyProvider for EthereumConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_retries: self.max_retries, retry_interval_ms: self.retry_interval_ms }
    }
}
