use anchor_submitter_client_interface::{CacheConfig, RetryPolicy, RetryPolicyProvider};
use serde::{Deserialize, Serialize};
use url::Url;

/// Chain B connection and submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateConfig {
    pub rpc_url: Url,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default)]
    pub sequence_cache: CacheConfig,

    /// `[pallet_index, call_index]` of `Nfts.validate_mint` in the target runtime
    pub validate_mint_call_index: [u8; 2],
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_interval_ms() -> u64 {
    2000
}

impl SubstrateConfig {
    pub fn new(rpc_url: Url, validate_mint_call_index: [u8; 2]) -> Self {
        Self {
            rpc_url,
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            sequence_cache: CacheConfig::default(),
            validate_mint_call_index,
        }
    }
}

impl RetryPolicyProvider for SubstrateConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_retries: self.max_retries, retry_interval_ms: self.retry_interval_ms }
    }
}
