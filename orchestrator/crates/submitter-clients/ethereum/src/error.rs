use alloy::primitives::Address;
use alloy::transports::{RpcError, TransportErrorKind};
use anchor_submitter_client_interface::MAX_RETRIES_REACHED;
use thiserror::Error;

/// Node error returned when the nonce was already consumed by a concurrent sender.
pub const NONCE_TOO_LOW: &str = "nonce too low";
/// Node error returned when another transaction with the same nonce sits in the mempool.
pub const REPLACEMENT_UNDERPRICED: &str = "replacement transaction underpriced";
/// Shorter form of [`REPLACEMENT_UNDERPRICED`] reported by some clients.
pub const TRANSACTION_UNDERPRICED: &str = "transaction underpriced";

#[derive(Error, Debug)]
pub enum EthereumError {
    #[error("failed to get chain nonce for {account}: {message}")]
    ChainNonce { account: Address, message: String },

    #[error("failed to get txpool data: {0}")]
    TxPool(String),

    #[error("failed to convert nonce: {0}")]
    InvalidPoolNonce(String),

    /// Error message returned verbatim by the node.
    #[error("{0}")]
    Rpc(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("contract error: {0}")]
    Contract(String),

    #[error("{}", MAX_RETRIES_REACHED)]
    MaxRetriesReached { attempts: u32 },
}

impl EthereumError {
    /// Whether the error signals a nonce collision with a concurrent submitter.
    ///
    /// The node message has to match exactly, anything else is terminal.
    pub fn is_nonce_collision(&self) -> bool {
        match self {
            Self::Rpc(message) => {
                message == NONCE_TOO_LOW || message == REPLACEMENT_UNDERPRICED || message == TRANSACTION_UNDERPRICED
            }
            _ => false,
        }
    }
}

impl From<RpcError<TransportErrorKind>> for EthereumError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::Rpc(payload.message.to_string()),
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for EthereumError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(rpc) => rpc.into(),
            other => Self::Contract(other.to_string()),
        }
    }
}
