use std::sync::Arc;

use anchor_submitter_client_interface::RetryPolicyProvider;
use anchor_substrate_submitter::{lookup_extrinsic, EventRetriever, ExtrinsicInfo, ExtrinsicLookup, SubstrateApi};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::QueuedTask;
use crate::error::TaskError;
use crate::types::jobs::JobValue;
use crate::types::params::{ExtrinsicStatusParams, TaskParams, EXTRINSIC_STATUS_TASK};

/// Inclusion record stored on the job once the extrinsic is found.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicInclusion {
    pub hash: String,
    pub block_hash: String,
    pub block_number: u32,
    pub index: u32,
}

impl From<&ExtrinsicInfo> for ExtrinsicInclusion {
    fn from(info: &ExtrinsicInfo) -> Self {
        Self {
            hash: format!("{:?}", info.hash),
            block_hash: format!("{:?}", info.block_hash),
            block_number: info.block_number,
            index: info.index,
        }
    }
}

/// Follows a submitted extrinsic block by block from its reference block until it is included,
/// then checks its outcome events.
pub struct ExtrinsicStatusTask {
    api: Arc<dyn SubstrateApi>,
    events: Arc<dyn EventRetriever>,
    policy: Arc<dyn RetryPolicyProvider>,
}

impl ExtrinsicStatusTask {
    pub fn new(
        api: Arc<dyn SubstrateApi>,
        events: Arc<dyn EventRetriever>,
        policy: Arc<dyn RetryPolicyProvider>,
    ) -> Self {
        Self { api, events, policy }
    }

    pub async fn find(&self, params: &ExtrinsicStatusParams) -> Result<ExtrinsicInfo, TaskError> {
        let policy = self.policy.retry_policy();
        let mut attempts = policy.attempts();
        let mut block_number = params.from_block;

        while attempts.next_attempt().is_some() {
            let lookup = lookup_extrinsic(
                self.api.as_ref(),
                self.events.as_ref(),
                params.ext_hash,
                block_number,
                &params.ext_signature,
            )
            .await?;
            match lookup {
                ExtrinsicLookup::Found(info) => {
                    tracing::info!(ext_hash = ?params.ext_hash, block_number, index = info.index, "Found extrinsic");
                    return Ok(info);
                }
                ExtrinsicLookup::BlockNotReady => {
                    tracing::warn!(block_number, "Block not ready yet, trying again");
                }
                ExtrinsicLookup::NotInBlock => {
                    tracing::warn!(
                        ext_hash = ?params.ext_hash,
                        block_number,
                        "Extrinsic not found in block, trying next block"
                    );
                    block_number += 1;
                }
            }
            tokio::time::sleep(policy.retry_interval()).await;
        }

        Err(TaskError::failed(format!("max tries reached for extrinsic {:?}", params.ext_hash)))
    }
}

#[async_trait]
impl QueuedTask for ExtrinsicStatusTask {
    fn name(&self) -> &'static str {
        EXTRINSIC_STATUS_TASK
    }

    async fn run(&self, params: &TaskParams) -> Result<Option<JobValue>, TaskError> {
        let TaskParams::ExtrinsicStatus(params) = params else {
            return Err(TaskError::failed(format!("{} received parameters of {}", self.name(), params.task_name())));
        };

        let info = self.find(params).await?;
        let value = serde_json::to_vec(&ExtrinsicInclusion::from(&info))
            .map_err(|e| TaskError::failed(format!("failed to encode extrinsic inclusion: {e}")))?;
        Ok(Some(JobValue { key: EXTRINSIC_STATUS_TASK.to_string(), key_idx: 0, value }))
    }
}
