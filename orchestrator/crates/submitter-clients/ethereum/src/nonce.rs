use std::sync::Arc;

use alloy::primitives::Address;
use anchor_submitter_client_interface::{AccountCache, CacheConfig};
use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, warn};

use crate::error::EthereumError;

/// Nonce related reads against the account-model chain.
#[automock]
#[async_trait]
pub trait EthereumNonceApi: Send + Sync {
    /// Next nonce for `account`, counting transactions the node already knows as pending.
    async fn pending_nonce_at(&self, account: Address) -> Result<u64, EthereumError>;

    /// Raw nonce keys of the pending mempool entries sent by `account` (`txpool_inspect`).
    async fn txpool_pending_nonces(&self, account: Address) -> Result<Vec<String>, EthereumError>;
}

/// Resolves the nonce to use for the next transaction of an account.
///
/// The chain view is recomputed on every call. The last nonce used successfully is kept in a
/// bounded cache and only consulted when the node does not expose its mempool.
pub struct NonceAllocator<A: ?Sized> {
    api: Arc<A>,
    txpool_access_enabled: bool,
    last_used: AccountCache<Address, u64>,
}

impl<A> NonceAllocator<A>
where
    A: EthereumNonceApi + ?Sized,
{
    pub fn new(api: Arc<A>, txpool_access_enabled: bool, cache: CacheConfig) -> Self {
        Self { api, txpool_access_enabled, last_used: AccountCache::new(cache) }
    }

    pub async fn next_nonce(&self, account: Address) -> Result<u64, EthereumError> {
        let chain_nonce = self
            .api
            .pending_nonce_at(account)
            .await
            .map_err(|e| EthereumError::ChainNonce { account, message: e.to_string() })?;

        if !self.txpool_access_enabled {
            warn!(%account, "Ethereum client doesn't support txpool API, may cause concurrency issues");
            return Ok(match self.last_used.get(&account) {
                Some(last) if last + 1 > chain_nonce => last + 1,
                _ => chain_nonce,
            });
        }

        let pool_nonces =
            self.api.txpool_pending_nonces(account).await.map_err(|e| EthereumError::TxPool(e.to_string()))?;
        if pool_nonces.is_empty() {
            return Ok(chain_nonce);
        }

        let mut highest = 0u64;
        for raw in pool_nonces {
            let nonce: u64 = raw.trim().parse().map_err(|_| EthereumError::InvalidPoolNonce(raw.clone()))?;
            highest = highest.max(nonce);
        }

        if highest >= chain_nonce {
            debug!(%account, chain_nonce, highest_pending = highest, "pending mempool nonce ahead of chain");
            Ok(highest + 1)
        } else {
            Ok(chain_nonce)
        }
    }

    pub fn record_used(&self, account: Address, nonce: u64) {
        self.last_used.insert(account, nonce);
    }

    pub fn invalidate(&self, account: Address) {
        self.last_used.remove(&account);
    }

    pub fn tracked_accounts(&self) -> usize {
        self.last_used.len()
    }
}
