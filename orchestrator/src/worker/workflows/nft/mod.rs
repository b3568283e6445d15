pub mod collaborators;
pub mod mint;
pub mod transfer;
pub mod types;

use std::sync::Arc;

use alloy::primitives::B256;
use anchor_ethereum_submitter::clients::NftRegistryApi;
use anchor_ethereum_submitter::{EthereumNonceApi, EthereumReadApi, TransactionStatus, TransactionSubmitter};

pub use collaborators::{DocumentService, NftChainApi, SubstrateNftChain};
pub use mint::MintNftWorkflow;
pub use transfer::TransferNftWorkflow;
pub use types::{MintNftArgs, MintNftRequest, MintRequest, TransferNftArgs};

use crate::error::TaskError;
use crate::worker::service::JobManager;

/// Collaborators shared by the NFT workflow steps.
pub struct NftClients {
    pub documents: Arc<dyn DocumentService>,
    pub chain: Arc<dyn NftChainApi>,
    pub registry: Arc<dyn NftRegistryApi>,
    pub ethereum: Arc<dyn EthereumReadApi>,
    pub submitter: Arc<TransactionSubmitter<dyn EthereumNonceApi>>,
    pub jobs: Arc<dyn JobManager>,
}

impl NftClients {
    /// Maps a receipt lookup onto the step contract: no receipt yet is retryable.
    pub(crate) async fn ensure_mined(&self, tx_hash: B256) -> Result<(), TaskError> {
        match self.ethereum.transaction_status(tx_hash).await? {
            TransactionStatus::Succeeded => Ok(()),
            TransactionStatus::Pending => Err(TaskError::retryable(format!("txn {tx_hash} not complete yet"))),
            TransactionStatus::Reverted => Err(TaskError::failed(format!("txn {tx_hash} reverted"))),
        }
    }
}
