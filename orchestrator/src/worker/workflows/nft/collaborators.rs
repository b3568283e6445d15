use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use anchor_substrate_submitter::{Call, ExtrinsicSubmitter, Signer, SubstrateApi};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{DocumentProofs, DocumentVersion, ProofRequest, SubstrateProof};
use crate::error::TaskError;
use crate::types::jobs::JobId;
use crate::types::AccountId;
use crate::worker::service::JobManager;
use crate::worker::tasks::{submit_and_watch, TaskDispatcher};

/// Chain on which `validate_mint` mints against: chain A.
pub const TARGET_CHAIN_ID: u8 = 0;

/// Document storage and anchoring, provided by the document layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn get_current_version(&self, account: &AccountId, document_id: &[u8]) -> anyhow::Result<DocumentVersion>;

    async fn create_proofs(
        &self,
        account: &AccountId,
        document_id: &[u8],
        request: ProofRequest,
    ) -> anyhow::Result<DocumentProofs>;

    /// Records the NFT on a new version of the document.
    async fn add_nft(
        &self,
        account: &AccountId,
        document: DocumentVersion,
        grant_read_access: bool,
        registry: Address,
        token_id: U256,
    ) -> anyhow::Result<DocumentVersion>;

    /// Anchors the document. The returned job, owned by the same account, completes once anchored.
    async fn commit(&self, account: &AccountId, document: DocumentVersion) -> anyhow::Result<JobId>;
}

/// Chain B side of a mint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NftChainApi: Send + Sync {
    /// Validates the proofs on chain B and triggers the bridge event that allows the mint on chain A.
    async fn validate_mint(
        &self,
        account: &AccountId,
        anchor_id: B256,
        deposit_address: Address,
        proofs: Vec<SubstrateProof>,
        static_proofs: [B256; 3],
    ) -> Result<(), TaskError>;
}

/// [`NftChainApi`] submitting `Nfts.validate_mint` and waiting for its inclusion.
pub struct SubstrateNftChain {
    submitter: Arc<ExtrinsicSubmitter<dyn SubstrateApi>>,
    signer: Arc<dyn Signer>,
    jobs: Arc<dyn JobManager>,
    dispatcher: Arc<TaskDispatcher>,
    call_index: [u8; 2],
}

impl SubstrateNftChain {
    pub fn new(
        submitter: Arc<ExtrinsicSubmitter<dyn SubstrateApi>>,
        signer: Arc<dyn Signer>,
        jobs: Arc<dyn JobManager>,
        dispatcher: Arc<TaskDispatcher>,
        call_index: [u8; 2],
    ) -> Self {
        Self { submitter, signer, jobs, dispatcher, call_index }
    }

    pub fn validate_mint_call(
        &self,
        anchor_id: B256,
        deposit_address: Address,
        proofs: Vec<SubstrateProof>,
        static_proofs: [B256; 3],
    ) -> Call {
        let static_proofs: [[u8; 32]; 3] = static_proofs.map(|proof| proof.0);
        Call::new(
            self.call_index[0],
            self.call_index[1],
            (anchor_id.0, deposit_address.0 .0, proofs, static_proofs, TARGET_CHAIN_ID),
        )
    }
}

#[async_trait]
impl NftChainApi for SubstrateNftChain {
    async fn validate_mint(
        &self,
        account: &AccountId,
        anchor_id: B256,
        deposit_address: Address,
        proofs: Vec<SubstrateProof>,
        static_proofs: [B256; 3],
    ) -> Result<(), TaskError> {
        let call = self.validate_mint_call(anchor_id, deposit_address, proofs, static_proofs);
        let (submitted, inclusion) = submit_and_watch(
            &self.submitter,
            self.jobs.clone(),
            self.dispatcher.clone(),
            *account,
            &call,
            self.signer.as_ref(),
            CancellationToken::new(),
        )
        .await?;

        tracing::info!(
            anchor_id = %anchor_id,
            tx_hash = ?submitted.tx_hash,
            block_number = inclusion.block_number,
            "Validated NFT proofs on chain"
        );
        Ok(())
    }
}
