use std::sync::Arc;

use alloy::network::Ethereum;
use alloy::primitives::{Address, B256};
use alloy::providers::ext::TxPoolApi;
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use url::Url;

use crate::error::EthereumError;
use crate::nonce::EthereumNonceApi;
use crate::read::{EthereumReadApi, EventLog, EventQuery, TransactionStatus};

/// JSON-RPC backed implementation of the chain reads the submitter and the waiting tasks need.
pub struct AlloyEthereumClient<P = RootProvider<Ethereum>> {
    provider: Arc<P>,
}

impl AlloyEthereumClient<RootProvider<Ethereum>> {
    pub fn connect(rpc_url: Url) -> Self {
        Self { provider: Arc::new(RootProvider::new_http(rpc_url)) }
    }
}

impl<P> AlloyEthereumClient<P>
where
    P: Provider<Ethereum>,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> Arc<P> {
        self.provider.clone()
    }
}

#[async_trait]
impl<P> EthereumNonceApi for AlloyEthereumClient<P>
where
    P: Provider<Ethereum> + Send + Sync,
{
    async fn pending_nonce_at(&self, account: Address) -> Result<u64, EthereumError> {
        Ok(self.provider.get_transaction_count(account).pending().await?)
    }

    async fn txpool_pending_nonces(&self, account: Address) -> Result<Vec<String>, EthereumError> {
        let inspect = self.provider.txpool_inspect().await?;
        Ok(inspect.pending.get(&account).map(|entries| entries.keys().cloned().collect()).unwrap_or_default())
    }
}

#[async_trait]
impl<P> EthereumReadApi for AlloyEthereumClient<P>
where
    P: Provider<Ethereum> + Send + Sync,
{
    async fn block_number(&self) -> Result<u64, EthereumError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn matching_logs(&self, query: EventQuery) -> Result<Vec<EventLog>, EthereumError> {
        let logs = self.provider.get_logs(&query.to_filter()).await?;
        Ok(logs
            .into_iter()
            .map(|log| EventLog { block_number: log.block_number, transaction_hash: log.transaction_hash })
            .collect())
    }

    async fn transaction_status(&self, tx_hash: B256) -> Result<TransactionStatus, EthereumError> {
        let status = match self.provider.get_transaction_receipt(tx_hash).await? {
            None => TransactionStatus::Pending,
            Some(receipt) if receipt.status() => TransactionStatus::Succeeded,
            Some(_) => TransactionStatus::Reverted,
        };
        Ok(status)
    }
}
