use std::sync::Arc;

use anchor_ethereum_submitter::clients::AnchorRepositoryApi;
use async_trait::async_trait;

use super::QueuedTask;
use crate::error::TaskError;
use crate::types::jobs::JobValue;
use crate::types::params::{TaskParams, ANCHOR_CONFIRMATION_TASK};

/// Reads the root stored under an anchor id. A zero root means the commit is not mined yet.
pub struct AnchorConfirmationTask {
    repository: Arc<dyn AnchorRepositoryApi>,
}

impl AnchorConfirmationTask {
    pub fn new(repository: Arc<dyn AnchorRepositoryApi>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueuedTask for AnchorConfirmationTask {
    fn name(&self) -> &'static str {
        ANCHOR_CONFIRMATION_TASK
    }

    async fn run(&self, params: &TaskParams) -> Result<Option<JobValue>, TaskError> {
        let TaskParams::AnchorConfirmation(params) = params else {
            return Err(TaskError::failed(format!("{} received parameters of {}", self.name(), params.task_name())));
        };

        let root = self.repository.document_root(params.repository, params.anchor_id).await?;
        if root.is_zero() {
            return Err(TaskError::retryable(format!("anchor {:#x} not committed yet", params.anchor_id)));
        }
        if root != params.document_root {
            return Err(TaskError::failed(format!(
                "anchor {:#x} holds root {root}, expected {}",
                params.anchor_id, params.document_root
            )));
        }

        tracing::info!(anchor_id = %params.anchor_id, document_root = %root, "Anchor committed");
        Ok(Some(JobValue { key: ANCHOR_CONFIRMATION_TASK.to_string(), key_idx: 0, value: root.to_vec() }))
    }
}
