pub mod clients;
pub mod error;
pub mod nonce;
pub mod read;
pub mod submitter;

#[cfg(test)]
mod tests;

pub use error::EthereumError;
pub use nonce::{EthereumNonceApi, MockEthereumNonceApi, NonceAllocator};
pub use read::{EthereumReadApi, EventLog, EventQuery, MockEthereumReadApi, TransactionStatus};
pub use submitter::TransactionSubmitter;
