pub mod anchor_confirmation;
pub mod dispatcher;
pub mod extrinsic_status;
pub mod jobs;
pub mod transaction_status;
pub mod wait_for_event;

use async_trait::async_trait;

pub use anchor_confirmation::AnchorConfirmationTask;
pub use dispatcher::{TaskDispatcher, TaskResult};
pub use extrinsic_status::ExtrinsicStatusTask;
pub use jobs::{create_wait_for_event_job, submit_and_watch, EventWait};
pub use transaction_status::TransactionStatusTask;
pub use wait_for_event::WaitForEventTask;

use crate::error::TaskError;
use crate::types::jobs::JobValue;
use crate::types::params::TaskParams;

/// A task executed from the queue boundary with already validated parameters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueuedTask: Send + Sync {
    /// Name the task is registered and recorded under
    fn name(&self) -> &'static str;

    /// One invocation. [`TaskError::Retryable`] asks the dispatcher to invoke it again.
    async fn run(&self, params: &TaskParams) -> Result<Option<JobValue>, TaskError>;
}
