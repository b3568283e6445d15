use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::Deserialize;
use sp_core::H256;
use url::Url;

use crate::api::{Block, Header, RuntimeVersion, SignedBlock, SubstrateApi};
use crate::error::SubstrateError;

/// [`SubstrateApi`] over the node's HTTP JSON-RPC endpoint.
pub struct RpcSubstrateClient {
    client: HttpClient,
}

impl RpcSubstrateClient {
    pub fn new(rpc_url: &Url) -> Result<Self, SubstrateError> {
        let client = HttpClientBuilder::default().build(rpc_url.as_str()).map_err(SubstrateError::from)?;
        Ok(Self { client })
    }
}

#[derive(Deserialize)]
struct RpcSignedBlock {
    block: RpcBlock,
}

#[derive(Deserialize)]
struct RpcBlock {
    header: RpcHeader,
    extrinsics: Vec<String>,
}

#[derive(Deserialize)]
struct RpcHeader {
    number: String,
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn from_hex(what: &'static str, value: &str) -> Result<Vec<u8>, SubstrateError> {
    hex::decode(value.trim_start_matches("0x")).map_err(|e| SubstrateError::decode(what, e))
}

fn hash_from_hex(value: &str) -> Result<H256, SubstrateError> {
    let bytes = from_hex("block hash", value)?;
    if bytes.len() != 32 {
        return Err(SubstrateError::Decode {
            what: "block hash",
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        });
    }
    Ok(H256::from_slice(&bytes))
}

impl TryFrom<RpcSignedBlock> for SignedBlock {
    type Error = SubstrateError;

    fn try_from(value: RpcSignedBlock) -> Result<Self, Self::Error> {
        let number = u32::from_str_radix(value.block.header.number.trim_start_matches("0x"), 16)
            .map_err(|e| SubstrateError::decode("block number", e))?;
        let extrinsics =
            value.block.extrinsics.iter().map(|raw| from_hex("extrinsic", raw)).collect::<Result<Vec<_>, _>>()?;
        Ok(SignedBlock { block: Block { header: Header { number }, extrinsics } })
    }
}

#[async_trait]
impl SubstrateApi for RpcSubstrateClient {
    async fn get_block_hash(&self, block_number: u64) -> Result<H256, SubstrateError> {
        let hash: Option<String> = self.client.request("chain_getBlockHash", rpc_params![block_number]).await?;
        match hash {
            Some(hash) => hash_from_hex(&hash),
            None => Err(SubstrateError::BlockNotReady),
        }
    }

    async fn get_runtime_version_latest(&self) -> Result<RuntimeVersion, SubstrateError> {
        Ok(self.client.request("state_getRuntimeVersion", rpc_params![]).await?)
    }

    async fn get_storage_latest(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, SubstrateError> {
        let value: Option<String> = self.client.request("state_getStorage", rpc_params![to_hex(&key)]).await?;
        value.map(|raw| from_hex("storage value", &raw)).transpose()
    }

    async fn get_storage(&self, key: Vec<u8>, block_hash: H256) -> Result<Option<Vec<u8>>, SubstrateError> {
        let value: Option<String> = self
            .client
            .request("state_getStorage", rpc_params![to_hex(&key), to_hex(block_hash.as_bytes())])
            .await?;
        value.map(|raw| from_hex("storage value", &raw)).transpose()
    }

    async fn get_block_latest(&self) -> Result<SignedBlock, SubstrateError> {
        let block: RpcSignedBlock = self.client.request("chain_getBlock", rpc_params![]).await?;
        block.try_into()
    }

    async fn get_block(&self, block_hash: H256) -> Result<SignedBlock, SubstrateError> {
        let block: RpcSignedBlock =
            self.client.request("chain_getBlock", rpc_params![to_hex(block_hash.as_bytes())]).await?;
        block.try_into()
    }

    async fn submit_extrinsic(&self, encoded: Vec<u8>) -> Result<H256, SubstrateError> {
        let hash: String = self.client.request("author_submitExtrinsic", rpc_params![to_hex(&encoded)]).await?;
        hash_from_hex(&hash)
    }

    async fn call(&self, method: String, params: Vec<serde_json::Value>) -> Result<serde_json::Value, SubstrateError> {
        let mut array = ArrayParams::new();
        for param in params {
            array.insert(param).map_err(|e| SubstrateError::Transport(e.to_string()))?;
        }
        Ok(self.client.request(&method, array).await?)
    }
}
