use sp_core::H256;
use tracing::debug;

use crate::api::{check_extrinsic_events, ChainEvent, EventRetriever, SubstrateApi};
use crate::error::SubstrateError;
use crate::extrinsic::{find_extrinsic_index, BlockNumber};

/// Where an extrinsic ended up once it was found in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicInfo {
    pub hash: H256,
    pub block_hash: H256,
    pub block_number: BlockNumber,
    pub index: u32,
    pub events: Vec<ChainEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtrinsicLookup {
    BlockNotReady,
    NotInBlock,
    Found(ExtrinsicInfo),
}

/// Looks for the extrinsic signed with `signature` in block `block_number` and checks its outcome.
pub async fn lookup_extrinsic<A, E>(
    api: &A,
    events: &E,
    tx_hash: H256,
    block_number: BlockNumber,
    signature: &[u8],
) -> Result<ExtrinsicLookup, SubstrateError>
where
    A: SubstrateApi + ?Sized,
    E: EventRetriever + ?Sized,
{
    let block_hash = match api.get_block_hash(block_number as u64).await {
        Ok(hash) => hash,
        Err(SubstrateError::BlockNotReady) => return Ok(ExtrinsicLookup::BlockNotReady),
        Err(e) => return Err(e),
    };

    let block = api.get_block(block_hash).await?;
    let Some(index) = find_extrinsic_index(&block.block.extrinsics, signature) else {
        debug!(?tx_hash, block_number, "Extrinsic not found in block");
        return Ok(ExtrinsicLookup::NotInBlock);
    };

    let block_events = events.events(block_hash).await.map_err(|e| SubstrateError::EventRetrieval(e.to_string()))?;
    let events = check_extrinsic_events(block_hash, index, block_events)?;
    Ok(ExtrinsicLookup::Found(ExtrinsicInfo { hash: tx_hash, block_hash, block_number, index, events }))
}
