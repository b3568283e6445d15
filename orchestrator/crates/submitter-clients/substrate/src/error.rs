use anchor_submitter_client_interface::MAX_RETRIES_REACHED;
use jsonrpsee::core::ClientError;
use sp_core::H256;
use thiserror::Error;

/// Pool rejection when a transaction with the same sequence is already known.
pub const PRIORITY_TOO_LOW: &str = "Priority is too low";
/// Pool rejection for a stale or future sequence number.
pub const INVALID_TRANSACTION: &str = "Invalid Transaction";

#[derive(Error, Debug)]
pub enum SubstrateError {
    #[error("block not ready")]
    BlockNotReady,

    /// Error message returned by the node.
    #[error("{0}")]
    Rpc(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("failed to read account sequence: {0}")]
    Sequence(String),

    #[error("MultiSignature not supported")]
    UnsupportedSignature,

    #[error("invalid signer: {0}")]
    InvalidSigner(String),

    #[error("event retrieval error: {0}")]
    EventRetrieval(String),

    #[error("extrinsic with index {0} failed")]
    ExtrinsicFailed(u32),

    #[error("no outcome event for extrinsic {index} in block {block_hash:?}")]
    MissingOutcome { block_hash: H256, index: u32 },

    #[error("{}", MAX_RETRIES_REACHED)]
    MaxRetriesReached { attempts: u32 },
}

impl SubstrateError {
    /// Whether the node rejected the extrinsic because its sequence number is stale.
    pub fn is_nonce_collision(&self) -> bool {
        match self {
            Self::Rpc(message) => message.contains(PRIORITY_TOO_LOW) || message.contains(INVALID_TRANSACTION),
            _ => false,
        }
    }

    pub(crate) fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode { what, reason: err.to_string() }
    }
}

impl From<ClientError> for SubstrateError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Call(call) => match call.data() {
                Some(data) => Self::Rpc(format!("{}: {}", call.message(), data.get())),
                None => Self::Rpc(call.message().to_string()),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<parity_scale_codec::Error> for SubstrateError {
    fn from(err: parity_scale_codec::Error) -> Self {
        Self::decode("scale value", err)
    }
}
