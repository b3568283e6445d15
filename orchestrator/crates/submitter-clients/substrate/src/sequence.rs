use std::sync::Arc;

use anchor_submitter_client_interface::{AccountCache, CacheConfig};
use tracing::debug;

use crate::api::SubstrateApi;
use crate::error::SubstrateError;
use crate::extrinsic::{decode_account_nonce, system_account_key, AccountId};

/// Per-account sequence numbers, cached in memory and refreshed from `System.Account` on demand.
pub struct SequenceAllocator<A: ?Sized> {
    api: Arc<A>,
    cache: AccountCache<AccountId, u32>,
}

impl<A> SequenceAllocator<A>
where
    A: SubstrateApi + ?Sized,
{
    pub fn new(api: Arc<A>, cache: CacheConfig) -> Self {
        Self { api, cache: AccountCache::new(cache) }
    }

    /// Cached sequence, read from chain storage on first use.
    pub async fn current(&self, account: &AccountId) -> Result<u32, SubstrateError> {
        match self.cache.get(account) {
            Some(sequence) => Ok(sequence),
            None => self.refresh(account).await,
        }
    }

    /// Replaces the cached sequence with the on-chain one.
    pub async fn refresh(&self, account: &AccountId) -> Result<u32, SubstrateError> {
        let sequence = self.chain_sequence(account).await?;
        debug!(account = %hex::encode(account), sequence, "Loaded sequence from chain");
        self.cache.insert(*account, sequence);
        Ok(sequence)
    }

    /// Optimistic bump after a successful submission.
    pub fn increment(&self, account: &AccountId) {
        self.cache.update(account, |sequence| *sequence += 1);
    }

    pub async fn chain_sequence(&self, account: &AccountId) -> Result<u32, SubstrateError> {
        let raw = self
            .api
            .get_storage_latest(system_account_key(account))
            .await
            .map_err(|e| SubstrateError::Sequence(e.to_string()))?;
        match raw {
            Some(raw) => decode_account_nonce(&raw),
            // accounts without storage have never sent anything
            None => Ok(0),
        }
    }
}
