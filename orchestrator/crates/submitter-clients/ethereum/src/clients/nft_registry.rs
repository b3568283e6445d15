use std::sync::Arc;

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EthereumError;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface NftRegistry {
        function mint(
            address to,
            uint256 tokenId,
            bytes32 anchorId,
            bytes[] calldata properties,
            bytes[] calldata values,
            bytes32[] calldata salts
        ) external;
        function transferFrom(address from, address to, uint256 tokenId) external;
        function ownerOf(uint256 tokenId) external view returns (address);
    }
}

/// Arguments of the registry `mint` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMint {
    pub to: Address,
    pub token_id: U256,
    pub anchor_id: B256,
    pub properties: Vec<Vec<u8>>,
    pub values: Vec<Vec<u8>>,
    pub salts: Vec<B256>,
}

/// Calls against an NFT registry contract. Writes carry the nonce allocated by the submitter.
#[automock]
#[async_trait]
pub trait NftRegistryApi: Send + Sync {
    async fn mint(&self, registry: Address, from: Address, nonce: u64, request: RegistryMint)
        -> Result<B256, EthereumError>;

    async fn transfer_from(
        &self,
        registry: Address,
        from: Address,
        to: Address,
        token_id: U256,
        nonce: u64,
    ) -> Result<B256, EthereumError>;

    async fn owner_of(&self, registry: Address, token_id: U256) -> Result<Address, EthereumError>;
}

/// Registry client over a wallet-enabled provider.
pub struct AlloyNftRegistry<P> {
    provider: Arc<P>,
}

impl<P> AlloyNftRegistry<P>
where
    P: Provider<Ethereum>,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> NftRegistryApi for AlloyNftRegistry<P>
where
    P: Provider<Ethereum> + Clone + Send + Sync,
{
    async fn mint(
        &self,
        registry: Address,
        from: Address,
        nonce: u64,
        request: RegistryMint,
    ) -> Result<B256, EthereumError> {
        let contract = NftRegistry::new(registry, self.provider.as_ref().clone());
        let properties: Vec<Bytes> = request.properties.into_iter().map(Bytes::from).collect();
        let values: Vec<Bytes> = request.values.into_iter().map(Bytes::from).collect();
        let salts: Vec<FixedBytes<32>> = request.salts;

        let pending = contract
            .mint(request.to, request.token_id, request.anchor_id, properties, values, salts)
            .from(from)
            .nonce(nonce)
            .send()
            .await?;
        let tx_hash = *pending.tx_hash();
        debug!(%registry, %from, nonce, %tx_hash, "Sent mint transaction");
        Ok(tx_hash)
    }

    async fn transfer_from(
        &self,
        registry: Address,
        from: Address,
        to: Address,
        token_id: U256,
        nonce: u64,
    ) -> Result<B256, EthereumError> {
        let contract = NftRegistry::new(registry, self.provider.as_ref().clone());
        let pending = contract.transferFrom(from, to, token_id).from(from).nonce(nonce).send().await?;
        let tx_hash = *pending.tx_hash();
        debug!(%registry, %from, %to, nonce, %tx_hash, "Sent transfer transaction");
        Ok(tx_hash)
    }

    async fn owner_of(&self, registry: Address, token_id: U256) -> Result<Address, EthereumError> {
        let contract = NftRegistry::new(registry, self.provider.as_ref().clone());
        Ok(contract.ownerOf(token_id).call().await?)
    }
}
