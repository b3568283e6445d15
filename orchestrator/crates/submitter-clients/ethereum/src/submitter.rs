use std::future::Future;
use std::sync::Arc;

use alloy::primitives::Address;
use anchor_submitter_client_interface::{AccountLocks, CacheConfig, RetryPolicyProvider};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::EthereumError;
use crate::nonce::{EthereumNonceApi, NonceAllocator};

/// Submits transactions for the account-model chain.
///
/// Nonce allocation is serialized per sender. A call that fails with a nonce collision is retried
/// with a freshly computed nonce until the retry policy is exhausted. Any other error is returned
/// as is.
pub struct TransactionSubmitter<A: ?Sized> {
    allocator: NonceAllocator<A>,
    locks: AccountLocks<Address>,
    policy: Arc<dyn RetryPolicyProvider>,
}

impl<A> TransactionSubmitter<A>
where
    A: EthereumNonceApi + ?Sized,
{
    pub fn new(
        api: Arc<A>,
        policy: Arc<dyn RetryPolicyProvider>,
        txpool_access_enabled: bool,
        nonce_cache: CacheConfig,
    ) -> Self {
        Self {
            allocator: NonceAllocator::new(api, txpool_access_enabled, nonce_cache),
            locks: AccountLocks::new(),
            policy,
        }
    }

    /// Runs `call` with the nonce allocated for `from`.
    ///
    /// `call` receives the nonce and performs the actual contract invocation, so the submitter never
    /// needs to know which method is being called.
    pub async fn submit<T, F, Fut>(&self, from: Address, mut call: F) -> Result<T, EthereumError>
    where
        F: FnMut(u64) -> Fut + Send,
        Fut: Future<Output = Result<T, EthereumError>> + Send,
        T: Send,
    {
        let policy = self.policy.retry_policy();
        let mut attempts = policy.attempts();

        let result = {
            let _guard = self.locks.lock(&from).await;
            loop {
                let Some(attempt) = attempts.next_attempt() else {
                    error!(%from, attempts = attempts.used(), "max concurrent transaction tries reached");
                    break Err(EthereumError::MaxRetriesReached { attempts: attempts.used() });
                };

                let nonce = match self.allocator.next_nonce(from).await {
                    Ok(nonce) => nonce,
                    Err(e) => break Err(e),
                };
                info!(%from, nonce, attempt, "Submitting transaction");

                match call(nonce).await {
                    Ok(tx) => {
                        self.allocator.record_used(from, nonce);
                        break Ok(tx);
                    }
                    Err(e) if e.is_nonce_collision() => {
                        warn!(
                            %from,
                            nonce,
                            attempt,
                            max_retries = attempts.max(),
                            error = %e,
                            "Concurrent transaction identified, trying again"
                        );
                        self.allocator.invalidate(from);
                        sleep(policy.retry_interval()).await;
                    }
                    Err(e) => break Err(e),
                }
            }
        };

        self.locks.prune();
        result
    }

    pub fn nonce_allocator(&self) -> &NonceAllocator<A> {
        &self.allocator
    }
}
