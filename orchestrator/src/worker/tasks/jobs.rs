use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anchor_ethereum_submitter::EventQuery;
use anchor_substrate_submitter::{Call, ExtrinsicSubmitter, Signer, SubmittedExtrinsic, SubstrateApi};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::dispatcher::TaskDispatcher;
use super::extrinsic_status::ExtrinsicInclusion;
use crate::error::{JobError, TaskError};
use crate::types::jobs::{JobId, JobStatus};
use crate::types::params::{ExtrinsicStatusParams, TaskParams, WaitForEventParams, EXTRINSIC_STATUS_TASK};
use crate::types::AccountId;
use crate::worker::service::{JobHandle, JobManager, JobWork};

/// Where to look for a chain A event.
#[derive(Debug, Clone)]
pub struct EventWait {
    pub event_signature: String,
    pub from_block: u64,
    pub address: Address,
    pub topic: B256,
}

/// Runs the wait-for-event task inside a job, bounded by the default task timeout.
pub async fn create_wait_for_event_job(
    jobs: Arc<dyn JobManager>,
    dispatcher: Arc<TaskDispatcher>,
    account: AccountId,
    existing_job_id: Option<JobId>,
    wait: EventWait,
    cancellation: CancellationToken,
) -> Result<JobHandle, JobError> {
    let timeout = jobs.default_task_timeout();
    let work: JobWork = Box::new(move |ctx| {
        async move {
            let query = EventQuery::new(wait.from_block, wait.address, &wait.event_signature, Some(wait.topic));
            let params = TaskParams::WaitForEvent(WaitForEventParams {
                job_id: ctx.job_id,
                account_id: ctx.account_id,
                event_name: wait.event_signature,
                query,
            });
            dispatcher.enqueue(params).map_err(JobError::other)?.get(timeout).await.map_err(JobError::other)?;
            Ok(())
        }
        .boxed()
    });

    jobs.execute_within_job(account, existing_job_id, "Waiting for Event from Ethereum".to_string(), work, cancellation)
        .await
}

/// Submits `call` and waits, under a new job, until the extrinsic is included and succeeded.
pub async fn submit_and_watch(
    submitter: &ExtrinsicSubmitter<dyn SubstrateApi>,
    jobs: Arc<dyn JobManager>,
    dispatcher: Arc<TaskDispatcher>,
    account: AccountId,
    call: &Call,
    signer: &dyn Signer,
    cancellation: CancellationToken,
) -> Result<(SubmittedExtrinsic, ExtrinsicInclusion), TaskError> {
    let submitted = submitter.submit_extrinsic(call, signer).await?;
    tracing::info!(
        tx_hash = ?submitted.tx_hash,
        reference_block = submitted.reference_block,
        sequence = submitted.sequence,
        "Extrinsic submitted, watching for inclusion"
    );

    let timeout = jobs.default_task_timeout();
    let ext_signature = submitted.signature.signature_bytes()?.to_vec();
    let (ext_hash, from_block) = (submitted.tx_hash, submitted.reference_block);
    let work: JobWork = Box::new(move |ctx| {
        async move {
            let params = TaskParams::ExtrinsicStatus(ExtrinsicStatusParams {
                job_id: ctx.job_id,
                account_id: ctx.account_id,
                ext_hash,
                from_block,
                ext_signature,
            });
            dispatcher.enqueue(params).map_err(JobError::other)?.get(timeout).await.map_err(JobError::other)?;
            Ok(())
        }
        .boxed()
    });

    let description = format!("Check extrinsic {:?}", submitted.tx_hash);
    let handle = jobs.execute_within_job(account, None, description, work, cancellation).await?;
    let job_id = handle.job_id;
    let status = handle.done.await.map_err(|_| JobError::CompletionDropped)?;

    let job = jobs.get_job(&account, &job_id).await?;
    match status {
        JobStatus::Success => {
            let value = job.values.get(EXTRINSIC_STATUS_TASK).ok_or_else(|| {
                TaskError::failed(format!("extrinsic status job {job_id} finished without an inclusion record"))
            })?;
            let inclusion = serde_json::from_slice(&value.value)
                .map_err(|e| TaskError::failed(format!("corrupt inclusion record on job {job_id}: {e}")))?;
            Ok((submitted, inclusion))
        }
        JobStatus::Failed => Err(JobError::JobFailed(job.status_view().message).into()),
        JobStatus::Pending => {
            Err(TaskError::failed(format!("watching extrinsic {:?} was cancelled", submitted.tx_hash)))
        }
    }
}
