use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anchor_ethereum_submitter::clients::{AnchorCommit, AnchorRepositoryApi, PreCommit};
use anchor_ethereum_submitter::{EthereumNonceApi, TransactionSubmitter};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, TaskError};
use crate::types::params::{AnchorConfirmationParams, TaskParams, TransactionStatusParams};
use crate::types::AccountId;
use crate::worker::service::{JobContext, JobHandle, JobManager, JobWork};
use crate::worker::tasks::TaskDispatcher;

pub const ANCHOR_DOCUMENT_JOB: &str = "Anchor Document Job";

/// Job value holding the hash of the commit transaction.
pub const ANCHOR_COMMIT_TXN: &str = "anchor_commit_txn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorArgs {
    /// Sender of both transactions
    pub account: AccountId,
    pub repository: Address,
    /// Sent and mined before the commit when present
    pub pre_commit: Option<PreCommit>,
    pub commit: AnchorCommit,
}

/// Anchors a document root on chain A: optional pre-commit, commit, then confirmation through the queue.
#[derive(Clone)]
pub struct AnchorWorkflow {
    repository: Arc<dyn AnchorRepositoryApi>,
    submitter: Arc<TransactionSubmitter<dyn EthereumNonceApi>>,
    jobs: Arc<dyn JobManager>,
    dispatcher: Arc<TaskDispatcher>,
}

impl AnchorWorkflow {
    pub fn new(
        repository: Arc<dyn AnchorRepositoryApi>,
        submitter: Arc<TransactionSubmitter<dyn EthereumNonceApi>>,
        jobs: Arc<dyn JobManager>,
        dispatcher: Arc<TaskDispatcher>,
    ) -> Self {
        Self { repository, submitter, jobs, dispatcher }
    }

    /// Runs the anchoring under a new job. The job value [`ANCHOR_COMMIT_TXN`] records the commit hash.
    pub async fn anchor(&self, args: AnchorArgs, cancellation: CancellationToken) -> Result<JobHandle, JobError> {
        if let Some(pre_commit) = &args.pre_commit {
            if pre_commit.anchor_id != args.commit.anchor_id {
                return Err(JobError::other(format!(
                    "pre-commit for anchor {:#x} cannot precede commit of anchor {:#x}",
                    pre_commit.anchor_id, args.commit.anchor_id
                )));
            }
        }

        let account = args.account;
        let workflow = self.clone();
        let work: JobWork = Box::new(move |ctx| {
            async move { workflow.run(&ctx, args).await.map_err(JobError::other) }.boxed()
        });

        self.jobs.execute_within_job(account, None, ANCHOR_DOCUMENT_JOB.to_string(), work, cancellation).await
    }

    async fn run(&self, ctx: &JobContext, args: AnchorArgs) -> Result<(), TaskError> {
        let from = args.account.address();
        let repository = args.repository;
        let anchor_id = args.commit.anchor_id;

        if let Some(pre_commit) = args.pre_commit {
            let tx_hash = self
                .submitter
                .submit(from, |nonce| {
                    let client = self.repository.clone();
                    let pre_commit = pre_commit.clone();
                    async move { client.pre_commit(repository, from, nonce, pre_commit).await }
                })
                .await
                .map_err(|e| TaskError::failed(format!("failed to submit pre-commit: {e}")))?;
            tracing::info!(tx_hash = %tx_hash, anchor_id = %anchor_id, "Sent pre-commit transaction");

            self.wait_mined(ctx, tx_hash).await?;
            if !self.repository.has_valid_pre_commit(repository, anchor_id).await? {
                return Err(TaskError::failed(format!("pre-commit for anchor {anchor_id:#x} is not valid")));
            }
        }

        let commit = args.commit;
        let document_root = commit.document_root;
        let tx_hash = self
            .submitter
            .submit(from, |nonce| {
                let client = self.repository.clone();
                let commit = commit.clone();
                async move { client.commit(repository, from, nonce, commit).await }
            })
            .await
            .map_err(|e| TaskError::failed(format!("failed to submit commit: {e}")))?;
        tracing::info!(
            tx_hash = %tx_hash,
            anchor_id = %anchor_id,
            document_root = %document_root,
            "Sent commit transaction"
        );
        self.jobs.update_job_with_value(&ctx.account_id, &ctx.job_id, ANCHOR_COMMIT_TXN, tx_hash.to_vec()).await?;

        let params = TaskParams::AnchorConfirmation(AnchorConfirmationParams {
            job_id: ctx.job_id,
            account_id: ctx.account_id,
            repository,
            anchor_id,
            document_root,
        });
        self.dispatcher.enqueue(params)?.get(self.jobs.default_task_timeout()).await?;
        Ok(())
    }

    async fn wait_mined(&self, ctx: &JobContext, tx_hash: B256) -> Result<(), TaskError> {
        let params = TaskParams::TransactionStatus(TransactionStatusParams {
            job_id: ctx.job_id,
            account_id: ctx.account_id,
            tx_hash,
        });
        self.dispatcher.enqueue(params)?.get(self.jobs.default_task_timeout()).await?;
        Ok(())
    }
}
