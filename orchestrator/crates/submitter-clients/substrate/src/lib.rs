pub mod api;
pub mod error;
pub mod extrinsic;
pub mod rpc;
pub mod sequence;
pub mod signer;
pub mod status;
pub mod submitter;

#[cfg(test)]
mod tests;

pub use api::{
    ChainEvent, EventRetriever, MockEventRetriever, MockSubstrateApi, Phase, RuntimeVersion, SignedBlock, SubstrateApi,
};
pub use error::SubstrateError;
pub use extrinsic::{AccountId, BlockNumber, Call, MultiSignature};
pub use rpc::RpcSubstrateClient;
pub use sequence::SequenceAllocator;
pub use signer::{Signer, Sr25519Signer};
pub use status::{lookup_extrinsic, ExtrinsicInfo, ExtrinsicLookup};
pub use submitter::{ExtrinsicSubmitter, SubmittedExtrinsic};
