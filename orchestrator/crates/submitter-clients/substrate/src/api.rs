use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use sp_core::H256;

use crate::error::SubstrateError;
use crate::extrinsic::BlockNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub spec_version: u32,
    pub transaction_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub number: BlockNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    /// Length prefixed SCALE encoded extrinsics.
    pub extrinsics: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBlock {
    pub block: Block,
}

/// Raw RPC surface of the substrate node.
#[automock]
#[async_trait]
pub trait SubstrateApi: Send + Sync {
    /// Fails with [`SubstrateError::BlockNotReady`] when the block is not produced yet.
    async fn get_block_hash(&self, block_number: u64) -> Result<H256, SubstrateError>;

    async fn get_runtime_version_latest(&self) -> Result<RuntimeVersion, SubstrateError>;

    async fn get_storage_latest(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, SubstrateError>;

    async fn get_storage(&self, key: Vec<u8>, block_hash: H256) -> Result<Option<Vec<u8>>, SubstrateError>;

    async fn get_block_latest(&self) -> Result<SignedBlock, SubstrateError>;

    async fn get_block(&self, block_hash: H256) -> Result<SignedBlock, SubstrateError>;

    async fn submit_extrinsic(&self, encoded: Vec<u8>) -> Result<H256, SubstrateError>;

    /// Raw JSON-RPC call.
    async fn call(&self, method: String, params: Vec<serde_json::Value>) -> Result<serde_json::Value, SubstrateError>;
}

pub const EXTRINSIC_SUCCESS_EVENT: &str = "System.ExtrinsicSuccess";
pub const EXTRINSIC_FAILED_EVENT: &str = "System.ExtrinsicFailed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

/// Decoded runtime event, named `Pallet.Event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub name: String,
    pub phase: Phase,
}

/// Decodes the events of a block. Needs runtime metadata so it is provided by the caller.
#[automock]
#[async_trait]
pub trait EventRetriever: Send + Sync {
    async fn events(&self, block_hash: H256) -> Result<Vec<ChainEvent>, SubstrateError>;
}

/// Checks the outcome events of the extrinsic at `index`.
pub fn check_extrinsic_events(
    block_hash: H256,
    index: u32,
    events: Vec<ChainEvent>,
) -> Result<Vec<ChainEvent>, SubstrateError> {
    for event in &events {
        if event.phase != Phase::ApplyExtrinsic(index) {
            continue;
        }
        match event.name.as_str() {
            EXTRINSIC_SUCCESS_EVENT => return Ok(events),
            EXTRINSIC_FAILED_EVENT => return Err(SubstrateError::ExtrinsicFailed(index)),
            _ => {}
        }
    }
    Err(SubstrateError::MissingOutcome { block_hash, index })
}
