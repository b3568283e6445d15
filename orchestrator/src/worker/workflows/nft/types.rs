use alloy::primitives::{keccak256, Address, B256, U256};
use anchor_ethereum_submitter::clients::RegistryMint;
use parity_scale_codec::Encode;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::types::AccountId;

/// Event emitted by the asset manager once an asset is deposited.
pub const ASSET_STORED_EVENT: &str = "AssetStored(bytes32)";

/// Caller input of a mint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MintNftRequest {
    pub document_id: Vec<u8>,
    pub registry_address: Address,
    pub deposit_address: Address,
    /// Zero when the mint does not wait for an asset deposit
    pub asset_manager_address: Address,
    pub proof_fields: Vec<String>,
    pub grant_nft_read_access: bool,
    pub submit_token_proof: bool,
    pub submit_nft_read_access_proof: bool,
}

/// Fixed input of every step of the mint chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintNftArgs {
    pub account: AccountId,
    pub token_id: U256,
    pub request: MintNftRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNftArgs {
    /// Current owner, also the sender of the transfer
    pub account: AccountId,
    pub to: Address,
    pub registry: Address,
    pub token_id: U256,
}

/// Opaque handle on the latest version of a document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentVersion {
    pub document_id: Vec<u8>,
    pub current_version: B256,
    pub next_version: B256,
}

/// What the proofs of a mint must cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequest {
    pub fields: Vec<String>,
    pub registry: Address,
    pub token_id: U256,
    pub submit_token_proof: bool,
    pub submit_read_access_proof: bool,
}

/// Merkle proof of one document field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldProof {
    pub property: Vec<u8>,
    pub value: Vec<u8>,
    pub salt: Vec<u8>,
    /// Set instead of `value` and `salt` for hashed fields
    pub hash: Vec<u8>,
    pub sorted_hashes: Vec<B256>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentProofs {
    pub field_proofs: Vec<FieldProof>,
    pub anchor_id: B256,
    pub data_root: B256,
    pub sibling_root: B256,
    pub signatures_root: B256,
}

/// Proof as consumed by `validate_mint` on chain B.
#[derive(Encode, Debug, Clone, PartialEq, Eq)]
pub struct SubstrateProof {
    pub leaf_hash: [u8; 32],
    pub sorted_hashes: Vec<[u8; 32]>,
}

/// Everything the registry mint and the proof validation need, derived once from the document proofs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub to: Address,
    pub token_id: U256,
    pub anchor_id: B256,
    pub props: Vec<Vec<u8>>,
    pub values: Vec<Vec<u8>>,
    pub salts: Vec<B256>,
    pub proofs: Vec<Vec<B256>>,
    /// keccak256 of `to` followed by every leaf hash
    pub bundled_hash: B256,
    /// Data root, sibling root and signatures root
    pub static_proofs: [B256; 3],
}

impl MintRequest {
    pub fn new(token_id: U256, to: Address, proofs: &DocumentProofs) -> Result<Self, TaskError> {
        let mut props = Vec::with_capacity(proofs.field_proofs.len());
        let mut values = Vec::with_capacity(proofs.field_proofs.len());
        let mut salts = Vec::with_capacity(proofs.field_proofs.len());
        let mut sorted = Vec::with_capacity(proofs.field_proofs.len());

        for proof in &proofs.field_proofs {
            let hashed_field = proof.value.is_empty() && proof.salt.is_empty();
            let salt = if hashed_field {
                B256::ZERO
            } else {
                B256::try_from(proof.salt.as_slice()).map_err(|_| {
                    TaskError::failed(format!("salt of property 0x{} is not 32 bytes", hex::encode(&proof.property)))
                })?
            };

            props.push(proof.property.clone());
            values.push(if hashed_field { proof.hash.clone() } else { proof.value.clone() });
            salts.push(salt);
            sorted.push(proof.sorted_hashes.clone());
        }

        let bundled_hash = bundled_hash(to, &props, &values, &salts);
        Ok(Self {
            to,
            token_id,
            anchor_id: proofs.anchor_id,
            props,
            values,
            salts,
            proofs: sorted,
            bundled_hash,
            static_proofs: [proofs.data_root, proofs.sibling_root, proofs.signatures_root],
        })
    }

    pub fn substrate_proofs(&self) -> Vec<SubstrateProof> {
        self.props
            .iter()
            .zip(&self.values)
            .zip(&self.salts)
            .zip(&self.proofs)
            .map(|(((prop, value), salt), hashes)| SubstrateProof {
                leaf_hash: leaf_hash(prop, value, salt).0,
                sorted_hashes: hashes.iter().map(|h| h.0).collect(),
            })
            .collect()
    }

    pub fn registry_mint(&self) -> RegistryMint {
        RegistryMint {
            to: self.to,
            token_id: self.token_id,
            anchor_id: self.anchor_id,
            properties: self.props.clone(),
            values: self.values.clone(),
            salts: self.salts.clone(),
        }
    }
}

/// `keccak256(prop || value || salt)`
pub fn leaf_hash(prop: &[u8], value: &[u8], salt: &B256) -> B256 {
    let mut leaf = Vec::with_capacity(prop.len() + value.len() + 32);
    leaf.extend_from_slice(prop);
    leaf.extend_from_slice(value);
    leaf.extend_from_slice(salt.as_slice());
    keccak256(leaf)
}

/// `keccak256(to || leaf_1 || ... || leaf_n)`
pub fn bundled_hash(to: Address, props: &[Vec<u8>], values: &[Vec<u8>], salts: &[B256]) -> B256 {
    let mut bundle = to.to_vec();
    for ((prop, value), salt) in props.iter().zip(values).zip(salts) {
        bundle.extend_from_slice(leaf_hash(prop, value, salt).as_slice());
    }
    keccak256(bundle)
}
