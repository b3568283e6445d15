use std::sync::Arc;

use alloy::primitives::B256;
use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::types::TransferNftArgs;
use super::NftClients;
use crate::error::{ChainBuildError, JobError, TaskError};
use crate::types::jobs::{JobId, JobStatus};
use crate::worker::service::{JobHandle, JobWork};
use crate::worker::task_chain::{
    ChainRunner, OverrideKey, Overrides, StepPolicy, StepSpec, TaskChain, TaskChainBuilder, TaskStep,
};

pub const TRANSFER_NFT_JOB: &str = "Transfer NFT Job";

pub const TRANSFER_OWNERSHIP: &str = "transfer_ownership";
pub const WAIT_FOR_TXN: &str = "wait_for_txn";

pub const TRANSFER_OWNER_TXN: OverrideKey<B256> = OverrideKey::new("transfer_owner_txn");

struct TransferOwnership(Arc<NftClients>);

#[async_trait]
impl TaskStep<TransferNftArgs> for TransferOwnership {
    async fn run(&self, args: &TransferNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let from = args.account.address();
        let (registry, to, token_id) = (args.registry, args.to, args.token_id);

        let tx_hash = self
            .0
            .submitter
            .submit(from, |nonce| {
                let client = self.0.registry.clone();
                async move { client.transfer_from(registry, from, to, token_id, nonce).await }
            })
            .await
            .map_err(|e| TaskError::failed(format!("failed to submit txn: {e}")))?;

        tracing::info!(
            tx_hash = %tx_hash,
            token_id = %token_id,
            to = %to,
            registry = %registry,
            "Sent transfer transaction"
        );
        overrides.set(&TRANSFER_OWNER_TXN, &tx_hash)
    }
}

struct WaitForTxn(Arc<NftClients>);

#[async_trait]
impl TaskStep<TransferNftArgs> for WaitForTxn {
    async fn run(&self, args: &TransferNftArgs, overrides: &mut Overrides) -> Result<(), TaskError> {
        let tx_hash = overrides.get(&TRANSFER_OWNER_TXN)?;
        self.0.ensure_mined(tx_hash).await?;

        let owner = self.0.registry.owner_of(args.registry, args.token_id).await?;
        if owner != args.to {
            return Err(TaskError::failed(format!("new nft owner[{owner}] doesn't match expected one[{}]", args.to)));
        }

        tracing::info!(token_id = %args.token_id, owner = %owner, "Token successfully transferred");
        Ok(())
    }
}

pub fn transfer_nft_chain(clients: Arc<NftClients>) -> Result<TaskChain<TransferNftArgs>, ChainBuildError> {
    TaskChainBuilder::new(TRANSFER_NFT_JOB)
        .step(
            StepSpec::new(TRANSFER_OWNERSHIP, TransferOwnership(clients.clone()))
                .writes(&[TRANSFER_OWNER_TXN.name()])
                .next(WAIT_FOR_TXN),
        )
        .step(StepSpec::new(WAIT_FOR_TXN, WaitForTxn(clients)).reads(&[TRANSFER_OWNER_TXN.name()]))
        .build()
}

pub struct TransferNftWorkflow {
    runner: Arc<ChainRunner<TransferNftArgs>>,
    clients: Arc<NftClients>,
}

impl TransferNftWorkflow {
    pub fn new(clients: Arc<NftClients>, policy: StepPolicy) -> Result<Self, ChainBuildError> {
        let chain = Arc::new(transfer_nft_chain(clients.clone())?);
        let runner = Arc::new(ChainRunner::new(chain, clients.jobs.clone(), policy));
        Ok(Self { runner, clients })
    }

    pub fn runner(&self) -> &ChainRunner<TransferNftArgs> {
        &self.runner
    }

    /// Transfers `token_id` from the account to `args.to` under a new job.
    pub async fn transfer(
        &self,
        args: TransferNftArgs,
        cancellation: CancellationToken,
    ) -> Result<JobHandle, JobError> {
        let account = args.account;
        let runner = self.runner.clone();
        let work: JobWork = Box::new(move |ctx| {
            async move {
                runner.start(&ctx.account_id, &ctx.job_id, &args).await.map_err(JobError::other)?;
                Ok(())
            }
            .boxed()
        });

        self.clients.jobs.execute_within_job(account, None, TRANSFER_NFT_JOB.to_string(), work, cancellation).await
    }

    pub async fn resume(
        &self,
        job_id: JobId,
        args: TransferNftArgs,
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

        self.clients
            .jobs
            .execute_within_job(account, Some(job_id), TRANSFER_NFT_JOB.to_string(), work, cancellation)
            .await
    }
}
