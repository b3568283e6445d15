use std::sync::Arc;

use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EthereumError;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface AnchorRepository {
        event AnchorPreCommitted(address indexed from, uint256 indexed anchorId, uint32 blockHeight);
        event AnchorCommitted(address indexed from, uint256 indexed anchorId, bytes32 documentRoot, uint32 blockHeight);

        function preCommit(uint256 anchorId, bytes32 signingRoot, uint256 expirationBlock) external payable;
        function commit(uint256 anchorId, bytes32 documentRoot, bytes32[] calldata documentProofs) external payable;
        function getAnchorById(uint256 id) external view returns (uint256 anchorId, bytes32 documentRoot);
        function hasValidPreCommit(uint256 anchorId) external view returns (bool);
    }
}

/// Reservation of an anchor id for a signing root, valid until `expiration_block`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreCommit {
    pub anchor_id: U256,
    pub signing_root: B256,
    pub expiration_block: U256,
}

impl PreCommit {
    pub fn to_call(&self) -> AnchorRepository::preCommitCall {
        AnchorRepository::preCommitCall {
            anchorId: self.anchor_id,
            signingRoot: self.signing_root,
            expirationBlock: self.expiration_block,
        }
    }
}

/// Final anchoring of a document root, with the proofs tying it to a pre-committed signing root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCommit {
    pub anchor_id: U256,
    pub document_root: B256,
    pub proofs: Vec<B256>,
}

impl AnchorCommit {
    pub fn to_call(&self) -> AnchorRepository::commitCall {
        AnchorRepository::commitCall {
            anchorId: self.anchor_id,
            documentRoot: self.document_root,
            documentProofs: self.proofs.clone(),
        }
    }
}

/// Calls against the anchor repository contract. Writes carry the nonce allocated by the submitter.
#[automock]
#[async_trait]
pub trait AnchorRepositoryApi: Send + Sync {
    async fn pre_commit(
        &self,
        repository: Address,
        from: Address,
        nonce: u64,
        pre_commit: PreCommit,
    ) -> Result<B256, EthereumError>;

    async fn commit(
        &self,
        repository: Address,
        from: Address,
        nonce: u64,
        commit: AnchorCommit,
    ) -> Result<B256, EthereumError>;

    /// Root anchored under `anchor_id`, zero while nothing is committed.
    async fn document_root(&self, repository: Address, anchor_id: U256) -> Result<B256, EthereumError>;

    async fn has_valid_pre_commit(&self, repository: Address, anchor_id: U256) -> Result<bool, EthereumError>;
}

/// Anchor repository client over a wallet-enabled provider.
pub struct AlloyAnchorRepository<P> {
    provider: Arc<P>,
}

impl<P> AlloyAnchorRepository<P>
where
    P: Provider<Ethereum>,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> AnchorRepositoryApi for AlloyAnchorRepository<P>
where
    P: Provider<Ethereum> + Clone + Send + Sync,
{
    async fn pre_commit(
        &self,
        repository: Address,
        from: Address,
        nonce: u64,
        pre_commit: PreCommit,
    ) -> Result<B256, EthereumError> {
        let contract = AnchorRepository::new(repository, self.provider.as_ref().clone());
        let pending = contract.call_builder(&pre_commit.to_call()).from(from).nonce(nonce).send().await?;
        let tx_hash = *pending.tx_hash();
        debug!(%repository, %from, nonce, anchor_id = %pre_commit.anchor_id, %tx_hash, "Sent pre-commit transaction");
        Ok(tx_hash)
    }

    async fn commit(
        &self,
        repository: Address,
        from: Address,
        nonce: u64,
        commit: AnchorCommit,
    ) -> Result<B256, EthereumError> {
        let contract = AnchorRepository::new(repository, self.provider.as_ref().clone());
        let pending = contract.call_builder(&commit.to_call()).from(from).nonce(nonce).send().await?;
        let tx_hash = *pending.tx_hash();
        debug!(%repository, %from, nonce, anchor_id = %commit.anchor_id, %tx_hash, "Sent commit transaction");
        Ok(tx_hash)
    }

    async fn document_root(&self, repository: Address, anchor_id: U256) -> Result<B256, EthereumError> {
        let contract = AnchorRepository::new(repository, self.provider.as_ref().clone());
        Ok(contract.getAnchorById(anchor_id).call().await?.documentRoot)
    }

    async fn has_valid_pre_commit(&self, repository: Address, anchor_id: U256) -> Result<bool, EthereumError> {
        let contract = AnchorRepository::new(repository, self.provider.as_ref().clone());
        Ok(contract.hasValidPreCommit(anchor_id).call().await?)
    }
}
