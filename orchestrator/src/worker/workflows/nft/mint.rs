use std::sync::Arc;

use alloy::primitives::B256;
use anchor_ethereum_submitter::EventQuery;
use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::types::{MintNftArgs, MintRequest, ProofRequest, ASSET_STORED_EVENT};
use super::NftClients;
use crate::error::{ChainBuildError, JobError, TaskError};
use crate::types::jobs::{JobId, JobStatus};
use crate::worker::service::{JobHandle, JobWork};
use crate::worker::task_chain::{
    ChainRunner, OverrideKey, Overrides, StepPolicy, StepSpec, TaskChain, TaskChainBuilder, TaskStep,
};

pub const MINT_NFT_JOB: &str = "Mint NFT Job";

pub const ADD_NFT_TO_DOCUMENT: &str = "add_nft_to_document";
pub const WAIT_FOR_DOCUMENT_COMMIT: &str = "wait_for_document_commit";
pub const VALIDATE_NFT_PROOFS: &str = "validate_nft_proofs";
pub const WAIT_FOR_ASSET_DEPOSIT: &str = "wait_for_asset_deposit";
pub const EXECUTE_MINT_NFT: &str = "execute_mint_nft";
pub const WAIT_MINT_NFT: &str = "wait_mint_nft";
pub const CHECK_NFT_OWNER: &str = "check_nft_owner";

pub const DOCUMENT_COMMIT_JOB: OverrideKey<JobId> = OverrideKey::new("document_commit_job");
pub const ETH_FROM_BLOCK: OverrideKey<u64> = OverrideKey::new("eth_from_block");
pub const MINT_REQUEST: OverrideKey<MintRequest> = OverrideKey::new("mint_request");
pub const MINT_NFT_TXN: OverrideKey<B256> = OverrideKey::new("mint_nft_txn");

struct AddNftToDocument(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for AddNftToDocument {
    async fn run(&self, args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let req = &args.request;
        let document = self
            .0
            .documents
            .get_current_version(&args.account, &req.document_id)
            .await
            .map_err(|e| TaskError::failed(format!("failed to get document: {e}")))?;
        let document = self
            .0
            .documents
            .add_nft(&args.account, document, req.grant_nft_read_access, req.registry_address, args.token_id)
            .await
            .map_err(|e| TaskError::failed(format!("failed to add nft to document: {e}")))?;
        let commit_job = self
            .0
            .documents
            .commit(&args.account, document)
            .await
            .map_err(|e| TaskError::failed(format!("failed to commit document: {e}")))?;

        overrides.set(&DOCUMENT_COMMIT_JOB, &commit_job)
    }
}

struct WaitForDocumentCommit(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for WaitForDocumentCommit {
    async fn run(&self, args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let commit_job = overrides.get(&DOCUMENT_COMMIT_JOB)?;
        let job = self
            .0
            .jobs
            .get_job(&args.account, &commit_job)
            .await
            .map_err(|e| TaskError::failed(format!("failed to fetch job: {e}")))?;

        match job.status {
            JobStatus::Success => Ok(()),
            JobStatus::Pending => Err(TaskError::retryable("document not committed yet")),
            JobStatus::Failed => Err(TaskError::failed(format!(
                "document commit job {commit_job} failed: {}",
                job.status_view().message
            ))),
        }
    }
}

struct ValidateNftProofs(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for ValidateNftProofs {
    async fn run(&self, args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let req = &args.request;
        let proofs = self
            .0
            .documents
            .create_proofs(
                &args.account,
                &req.document_id,
                ProofRequest {
                    fields: req.proof_fields.clone(),
                    registry: req.registry_address,
                    token_id: args.token_id,
                    submit_token_proof: req.submit_token_proof,
                    submit_read_access_proof: req.grant_nft_read_access && req.submit_nft_read_access_proof,
                },
            )
            .await
            .map_err(|e| TaskError::failed(format!("failed to prepare mint request: {e}")))?;
        let request = MintRequest::new(args.token_id, req.deposit_address, &proofs)?;

        let from_block = self.0.ethereum.block_number().await?;
        overrides.set(&ETH_FROM_BLOCK, &from_block)?;
        overrides.set(&MINT_REQUEST, &request)?;

        self.0
            .chain
            .validate_mint(
                &args.account,
                request.anchor_id,
                request.to,
                request.substrate_proofs(),
                request.static_proofs,
            )
            .await
            .map_err(|e| TaskError::failed(format!("failed to validate nft proofs: {e}")))?;

        tracing::info!(anchor_id = %request.anchor_id, "Successfully validated proofs on chain");
        Ok(())
    }
}

struct WaitForAssetDeposit(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for WaitForAssetDeposit {
    async fn run(&self, args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let asset_manager = args.request.asset_manager_address;
        if asset_manager.is_zero() {
            return Ok(());
        }

        let from_block = overrides.get(&ETH_FROM_BLOCK)?;
        let request = overrides.get(&MINT_REQUEST)?;
        let query = EventQuery::new(from_block, asset_manager, ASSET_STORED_EVENT, Some(request.bundled_hash));
        if self.0.ethereum.matching_logs(query).await?.is_empty() {
            return Err(TaskError::retryable(format!(
                "asset {} not deposited on {asset_manager} since block {from_block}",
                request.bundled_hash
            )));
        }

        tracing::info!(asset = %request.bundled_hash, "Asset successfully deposited");
        Ok(())
    }
}

struct ExecuteMintNft(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for ExecuteMintNft {
    async fn run(&self, args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let request = overrides.get(&MINT_REQUEST)?;
        let registry = args.request.registry_address;
        let from = args.account.address();
        let mint = request.registry_mint();

        let tx_hash = self
            .0
            .submitter
            .submit(from, |nonce| {
                let client = self.0.registry.clone();
                let mint = mint.clone();
                async move { client.mint(registry, from, nonce, mint).await }
            })
            .await
            .map_err(|e| TaskError::failed(format!("failed to submit txn: {e}")))?;

        tracing::info!(
            tx_hash = %tx_hash,
            token_id = %request.token_id,
            to = %request.to,
            registry = %registry,
            "Sent mint transaction"
        );
        overrides.set(&MINT_NFT_TXN, &tx_hash)
    }
}

struct WaitMintNft(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for WaitMintNft {
    async fn run(&self, _args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let tx_hash = overrides.get(&MINT_NFT_TXN)?;
        self.0.ensure_mined(tx_hash).await
    }
}

struct CheckNftOwner(Arc<NftClients>);

#[async_trait]
impl TaskStep<MintNftArgs> for CheckNftOwner {
    async fn run(&self, args: &MintNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let req = &args.request;
        let owner = self.0.registry.owner_of(req.registry_address, args.token_id).await?;
        if owner != req.deposit_address {
            return Err(TaskError::failed(format!(
                "owner for tokenID {} should be {}, instead got {}",
                args.token_id, req.deposit_address, owner
            )));
        }

        tracing::info!(
            document_id = %hex::encode(&req.document_id),
            tx_hash = %overrides.get(&MINT_NFT_TXN)?,
            "Document minted successfully"
        );
        Ok(())
    }
}

/// Mint chain: add the NFT to the document, anchor it, validate the proofs on chain B, optionally
/// wait for the asset deposit, then mint on chain A and check the owner.
pub fn mint_nft_chain(clients: Arc<NftClients>) -> Result<TaskChain<MintNftArgs>, ChainBuildError> {
    TaskChainBuilder::new(MINT_NFT_JOB)
        .step(
            StepSpec::new(ADD_NFT_TO_DOCUMENT, AddNftToDocument(clients.clone()))
                .writes(&[DOCUMENT_COMMIT_JOB.name()])
                .next(WAIT_FOR_DOCUMENT_COMMIT),
        )
        .step(
            StepSpec::new(WAIT_FOR_DOCUMENT_COMMIT, WaitForDocumentCommit(clients.clone()))
                .reads(&[DOCUMENT_COMMIT_JOB.name()])
                .next(VALIDATE_NFT_PROOFS),
        )
        .step(
            StepSpec::new(VALIDATE_NFT_PROOFS, ValidateNftProofs(clients.clone()))
                .writes(&[ETH_FROM_BLOCK.name(), MINT_REQUEST.name()])
                .next(WAIT_FOR_ASSET_DEPOSIT),
        )
        .step(
            StepSpec::new(WAIT_FOR_ASSET_DEPOSIT, WaitForAssetDeposit(clients.clone()))
                .reads(&[ETH_FROM_BLOCK.name(), MINT_REQUEST.name()])
                .next(EXECUTE_MINT_NFT),
        )
        .step(
            StepSpec::new(EXECUTE_MINT_NFT, ExecuteMintNft(clients.clone()))
                .reads(&[MINT_REQUEST.name()])
                .writes(&[MINT_NFT_TXN.name()])
                .next(WAIT_MINT_NFT),
        )
        .step(
            StepSpec::new(WAIT_MINT_NFT, WaitMintNft(clients.clone()))
                .reads(&[MINT_NFT_TXN.name()])
                .next(CHECK_NFT_OWNER),
        )
        .step(StepSpec::new(CHECK_NFT_OWNER, CheckNftOwner(clients)).reads(&[MINT_NFT_TXN.name()]))
        .build()
}

/// Entry point of NFT mints.
pub struct MintNftWorkflow {
    runner: Arc<ChainRunner<MintNftArgs>>,
    clients: Arc<NftClients>,
}

impl MintNftWorkflow {
    pub fn new(clients: Arc<NftClients>, policy: StepPolicy) -> Result<Self, ChainBuildError> {
        let chain = Arc::new(mint_nft_chain(clients.clone())?);
        let runner = Arc::new(ChainRunner::new(chain, clients.jobs.clone(), policy));
        Ok(Self { runner, clients })
    }

    pub fn runner(&self) -> &ChainRunner<MintNftArgs> {
        &self.runner
    }

    /// Starts a mint under a new job. The job succeeds once the chain completes.
    pub async fn mint(&self, args: MintNftArgs, cancellation: CancellationToken) -> Result<JobHandle, JobError> {
        let req = &args.request;
        if !req.grant_nft_read_access && req.submit_nft_read_access_proof {
            return Err(JobError::other("enable grant_nft_access to generate Read Access Proof"));
        }

        let account = args.account;
        let runner = self.runner.clone();
        let work: JobWork = Box::new(move |ctx| {
            async move {
                runner.start(&ctx.account_id, &ctx.job_id, &args).await.map_err(JobError::other)?;
                Ok(())
            }
            .boxed()
        });

        self.clients.jobs.execute_within_job(account, None, MINT_NFT_JOB.to_string(), work, cancellation).await
    }

    /// Continues the mint recorded on `job_id`, e.g. after a restart, and finalizes the job itself.
    pub async fn resume(
        &self,
        job_id: JobId,
        args: MintNftArgs,
        cancellation: CancellationToken,
    ) -> Result<JobHandle, JobError> {
        let account = args.account;
        let runner = self.runner.clone();
        let jobs = self.clients.jobs.clone();
        let work: JobWork = Box::new(move |ctx| {
            async move {
                runner.resume(&ctx.account_id, &ctx.job_id, &args).await.map_err(JobError::other)?;
                jobs.finalize_job(&ctx.account_id, &ctx.job_id, JobStatus::Success, "task chain completed").await?;
                Ok(())
            }
            .boxed()
        });

        self.clients.jobs.execute_within_job(account, Some(job_id), MINT_NFT_JOB.to_string(), work, cancellation).await
    }
}
