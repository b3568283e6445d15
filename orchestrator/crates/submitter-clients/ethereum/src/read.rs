use alloy::primitives::{keccak256, Address, B256};
use alloy::rpc::types::Filter;
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::EthereumError;

/// Log filter used while waiting for a contract event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub from_block: u64,
    pub address: Address,
    /// `topic0`, the keccak-256 hash of the event signature.
    pub event_signature: B256,
    /// `topic1`, usually the first indexed argument.
    pub topic: Option<B256>,
}

impl EventQuery {
    /// Builds a query from a human readable signature like `AssetStored(bytes32)`.
    pub fn new(from_block: u64, address: Address, signature: &str, topic: Option<B256>) -> Self {
        Self { from_block, address, event_signature: keccak256(signature.as_bytes()), topic }
    }

    pub fn to_filter(&self) -> Filter {
        let filter =
            Filter::new().from_block(self.from_block).address(self.address).event_signature(self.event_signature);
        match self.topic {
            Some(topic) => filter.topic1(topic),
            None => filter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// No receipt yet.
    Pending,
    Succeeded,
    Reverted,
}

/// Read-only view of the account-model chain used by the waiting tasks.
#[automock]
#[async_trait]
pub trait EthereumReadApi: Send + Sync {
    async fn block_number(&self) -> Result<u64, EthereumError>;

    async fn matching_logs(&self, query: EventQuery) -> Result<Vec<EventLog>, EthereumError>;

    async fn transaction_status(&self, tx_hash: B256) -> Result<TransactionStatus, EthereumError>;
}
