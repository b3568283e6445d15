use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use anchor_ethereum_submitter::EventQuery;
use serde_json::{Map, Value};
use sp_core::H256;

use crate::error::ParamError;
use crate::types::jobs::JobId;
use crate::types::AccountId;

pub const JOB_ID_PARAM: &str = "jobID";
pub const ACCOUNT_ID_PARAM: &str = "Account ID";

pub const EXT_HASH_PARAM: &str = "ExtHashParam";
pub const FROM_BLOCK_PARAM: &str = "FromBlockParam";
pub const EXT_SIGNATURE_PARAM: &str = "ExtSignatureParam";

pub const WAIT_FOR_EVENT_FROM_BLOCK: &str = "WaitForEventFromBlock";
pub const WAIT_FOR_EVENT_ADDRESS: &str = "WaitForEventAddress";
pub const WAIT_FOR_EVENT_NAME_SIGNATURE: &str = "WaitForEventNameSignature";
pub const WAIT_FOR_EVENT_TOPIC: &str = "WaitForEventTopic";

pub const TX_HASH_PARAM: &str = "TxHashParam";

pub const ANCHOR_ID_PARAM: &str = "AnchorIDParam";
pub const ANCHOR_REPOSITORY_PARAM: &str = "AddressParam";
pub const DOCUMENT_ROOT_PARAM: &str = "DocumentRootParam";

pub const EXTRINSIC_STATUS_TASK: &str = "ExtrinsicStatusTaskName";
pub const WAIT_FOR_EVENT_TASK: &str = "EthWaitForEventTask";
pub const TRANSACTION_STATUS_TASK: &str = "EthTransactionStatusTask";
pub const ANCHOR_CONFIRMATION_TASK: &str = "AnchorRepositoryConfirmationTaskName";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicStatusParams {
    pub job_id: JobId,
    pub account_id: AccountId,
    pub ext_hash: H256,
    pub from_block: u32,
    pub ext_signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitForEventParams {
    pub job_id: JobId,
    pub account_id: AccountId,
    /// Signature as given, e.g. `AssetStored(bytes32)`. The query holds its hash.
    pub event_name: String,
    pub query: EventQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatusParams {
    pub job_id: JobId,
    pub account_id: AccountId,
    pub tx_hash: B256,
}

/// Anchor expected to hold `document_root` on the repository contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorConfirmationParams {
    pub job_id: JobId,
    pub account_id: AccountId,
    pub repository: Address,
    pub anchor_id: U256,
    pub document_root: B256,
}

/// Parameters of a queued task, validated once when the untyped map enters the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskParams {
    ExtrinsicStatus(ExtrinsicStatusParams),
    WaitForEvent(WaitForEventParams),
    TransactionStatus(TransactionStatusParams),
    AnchorConfirmation(AnchorConfirmationParams),
}

impl TaskParams {
    pub fn from_kwargs(task_name: &str, kwargs: &Map<String, Value>) -> Result<Self, ParamError> {
        let job_id = parse_str(kwargs, JOB_ID_PARAM)?;
        let account_id = parse_str(kwargs, ACCOUNT_ID_PARAM)?;

        match task_name {
            EXTRINSIC_STATUS_TASK => {
                let ext_hash = parse_h256(kwargs, EXT_HASH_PARAM)?;
                let from_block = require(kwargs, FROM_BLOCK_PARAM)?
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| ParamError::malformed(FROM_BLOCK_PARAM, "expected a block number"))?;
                let ext_signature = parse_hex(kwargs, EXT_SIGNATURE_PARAM)?;
                Ok(Self::ExtrinsicStatus(ExtrinsicStatusParams {
                    job_id,
                    account_id,
                    ext_hash,
                    from_block,
                    ext_signature,
                }))
            }
            WAIT_FOR_EVENT_TASK => {
                let from_block = parse_big(kwargs, WAIT_FOR_EVENT_FROM_BLOCK)?;
                let address: Address = parse_str(kwargs, WAIT_FOR_EVENT_ADDRESS)?;
                let event_name = require_str(kwargs, WAIT_FOR_EVENT_NAME_SIGNATURE)?.to_string();
                let topic = parse_b256(kwargs, WAIT_FOR_EVENT_TOPIC)?;
                let query = EventQuery::new(from_block, address, &event_name, Some(topic));
                Ok(Self::WaitForEvent(WaitForEventParams { job_id, account_id, event_name, query }))
            }
            TRANSACTION_STATUS_TASK => {
                let tx_hash = parse_b256(kwargs, TX_HASH_PARAM)?;
                Ok(Self::TransactionStatus(TransactionStatusParams { job_id, account_id, tx_hash }))
            }
            ANCHOR_CONFIRMATION_TASK => {
                let repository: Address = parse_str(kwargs, ANCHOR_REPOSITORY_PARAM)?;
                let anchor_id = parse_u256(kwargs, ANCHOR_ID_PARAM)?;
                let document_root = parse_b256(kwargs, DOCUMENT_ROOT_PARAM)?;
                Ok(Self::AnchorConfirmation(AnchorConfirmationParams {
                    job_id,
                    account_id,
                    repository,
                    anchor_id,
                    document_root,
                }))
            }
            other => Err(ParamError::UnknownTask(other.to_string())),
        }
    }

    /// Untyped form handed to the queue.
    pub fn to_kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        kwargs.insert(JOB_ID_PARAM.to_string(), Value::String(self.job_id().to_string()));
        kwargs.insert(ACCOUNT_ID_PARAM.to_string(), Value::String(self.account_id().to_string()));

        match self {
            Self::ExtrinsicStatus(params) => {
                kwargs.insert(EXT_HASH_PARAM.to_string(), Value::String(format!("{:?}", params.ext_hash)));
                kwargs.insert(FROM_BLOCK_PARAM.to_string(), Value::from(params.from_block));
                kwargs.insert(
                    EXT_SIGNATURE_PARAM.to_string(),
                    Value::String(format!("0x{}", hex::encode(&params.ext_signature))),
                );
            }
            Self::WaitForEvent(params) => {
                kwargs.insert(
                    WAIT_FOR_EVENT_FROM_BLOCK.to_string(),
                    Value::String(format!("{:#x}", U256::from(params.query.from_block))),
                );
                kwargs.insert(WAIT_FOR_EVENT_ADDRESS.to_string(), Value::String(params.query.address.to_string()));
                kwargs.insert(WAIT_FOR_EVENT_NAME_SIGNATURE.to_string(), Value::String(params.event_name.clone()));
                if let Some(topic) = params.query.topic {
                    kwargs.insert(WAIT_FOR_EVENT_TOPIC.to_string(), Value::String(topic.to_string()));
                }
            }
            Self::TransactionStatus(params) => {
                kwargs.insert(TX_HASH_PARAM.to_string(), Value::String(params.tx_hash.to_string()));
            }
            Self::AnchorConfirmation(params) => {
                kwargs.insert(ANCHOR_REPOSITORY_PARAM.to_string(), Value::String(params.repository.to_string()));
                kwargs.insert(ANCHOR_ID_PARAM.to_string(), Value::String(format!("{:#x}", params.anchor_id)));
                kwargs.insert(DOCUMENT_ROOT_PARAM.to_string(), Value::String(params.document_root.to_string()));
            }
        }
        kwargs
    }

    pub fn task_name(&self) -> &'static str {
        match self {
            Self::ExtrinsicStatus(_) => EXTRINSIC_STATUS_TASK,
            Self::WaitForEvent(_) => WAIT_FOR_EVENT_TASK,
            Self::TransactionStatus(_) => TRANSACTION_STATUS_TASK,
            Self::AnchorConfirmation(_) => ANCHOR_CONFIRMATION_TASK,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            Self::ExtrinsicStatus(params) => params.job_id,
            Self::WaitForEvent(params) => params.job_id,
            Self::TransactionStatus(params) => params.job_id,
            Self::AnchorConfirmation(params) => params.job_id,
        }
    }

    pub fn account_id(&self) -> AccountId {
        match self {
            Self::ExtrinsicStatus(params) => params.account_id,
            Self::WaitForEvent(params) => params.account_id,
            Self::TransactionStatus(params) => params.account_id,
            Self::AnchorConfirmation(params) => params.account_id,
        }
    }
}

fn require<'a>(kwargs: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ParamError> {
    kwargs.get(key).ok_or_else(|| ParamError::missing(key))
}

fn require_str<'a>(kwargs: &'a Map<String, Value>, key: &str) -> Result<&'a str, ParamError> {
    require(kwargs, key)?.as_str().ok_or_else(|| ParamError::malformed(key, "expected a string"))
}

fn parse_str<T>(kwargs: &Map<String, Value>, key: &str) -> Result<T, ParamError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    require_str(kwargs, key)?.parse().map_err(|e| ParamError::malformed(key, e))
}

fn parse_hex(kwargs: &Map<String, Value>, key: &str) -> Result<Vec<u8>, ParamError> {
    let raw = require_str(kwargs, key)?;
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw)).map_err(|e| ParamError::malformed(key, e))
}

fn parse_b256(kwargs: &Map<String, Value>, key: &str) -> Result<B256, ParamError> {
    let bytes = parse_hex(kwargs, key)?;
    if bytes.len() != 32 {
        return Err(ParamError::malformed(key, format!("expected 32 bytes, got {}", bytes.len())));
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_h256(kwargs: &Map<String, Value>, key: &str) -> Result<H256, ParamError> {
    parse_b256(kwargs, key).map(|hash| H256::from(hash.0))
}

/// `0x` prefixed hex integer.
fn parse_u256(kwargs: &Map<String, Value>, key: &str) -> Result<U256, ParamError> {
    let raw = require_str(kwargs, key)?;
    let digits = raw.strip_prefix("0x").ok_or_else(|| ParamError::malformed(key, "missing 0x prefix"))?;
    U256::from_str_radix(digits, 16).map_err(|e| ParamError::malformed(key, e))
}

fn parse_big(kwargs: &Map<String, Value>, key: &str) -> Result<u64, ParamError> {
    let value = parse_u256(kwargs, key)?;
    u64::try_from(value).map_err(|_| ParamError::malformed(key, "block number out of range"))
}
