use std::sync::Arc;

use anchor_ethereum_submitter::EthereumReadApi;
use async_trait::async_trait;

use super::QueuedTask;
use crate::error::TaskError;
use crate::types::jobs::JobValue;
use crate::types::params::{TaskParams, WAIT_FOR_EVENT_TASK};

/// Single log query per invocation. No matching log means "not yet".
pub struct WaitForEventTask {
    client: Arc<dyn EthereumReadApi>,
}

impl WaitForEventTask {
    pub fn new(client: Arc<dyn EthereumReadApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueuedTask for WaitForEventTask {
    fn name(&self) -> &'static str {
        WAIT_FOR_EVENT_TASK
    }

    async fn run(&self, params: &TaskParams) -> Result<Option<JobValue>, TaskError> {
        let TaskParams::WaitForEvent(params) = params else {
            return Err(TaskError::failed(format!("{} received parameters of {}", self.name(), params.task_name())));
        };

        let logs = self.client.matching_logs(params.query.clone()).await?;
        let Some(found) = logs.first() else {
            return Err(TaskError::retryable(format!(
                "event {} not emitted by {} since block {}",
                params.event_name, params.query.address, params.query.from_block
            )));
        };

        tracing::info!(
            event = %params.event_name,
            address = %params.query.address,
            block_number = ?found.block_number,
            "Event emitted"
        );
        Ok(None)
    }
}
