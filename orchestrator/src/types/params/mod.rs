pub mod task;

pub use task::{
    AnchorConfirmationParams, ExtrinsicStatusParams, TaskParams, TransactionStatusParams, WaitForEventParams,
    ANCHOR_CONFIRMATION_TASK, EXTRINSIC_STATUS_TASK, TRANSACTION_STATUS_TASK, WAIT_FOR_EVENT_TASK,
};
