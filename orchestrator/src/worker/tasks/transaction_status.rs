use std::sync::Arc;

use anchor_ethereum_submitter::{EthereumReadApi, TransactionStatus};
use async_trait::async_trait;

use super::QueuedTask;
use crate::error::TaskError;
use crate::types::jobs::JobValue;
use crate::types::params::{TaskParams, TRANSACTION_STATUS_TASK};

/// Checks the receipt of a chain A transaction.
pub struct TransactionStatusTask {
    client: Arc<dyn EthereumReadApi>,
}

impl TransactionStatusTask {
    pub fn new(client: Arc<dyn EthereumReadApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueuedTask for TransactionStatusTask {
    fn name(&self) -> &'static str {
        TRANSACTION_STATUS_TASK
    }

    async fn run(&self, params: &TaskParams) -> Result<Option<JobValue>, TaskError> {
        let TaskParams::TransactionStatus(params) = params else {
            return Err(TaskError::failed(format!("{} received parameters of {}", self.name(), params.task_name())));
        };

        match self.client.transaction_status(params.tx_hash).await? {
            TransactionStatus::Pending => {
                Err(TaskError::retryable(format!("transaction {} not mined yet", params.tx_hash)))
            }
            TransactionStatus::Reverted => Err(TaskError::failed(format!("transaction {} reverted", params.tx_hash))),
            TransactionStatus::Succeeded => Ok(None),
        }
    }
}
