use parity_scale_codec::{Compact, Decode, Encode};
use sp_core::hashing::{blake2_128, blake2_256, twox_128};
use sp_core::H256;

use crate::error::SubstrateError;

/// Version byte of a signed extrinsic (format 4 with the signed bit set).
pub const SIGNED_EXTRINSIC_VERSION: u8 = 0x84;
/// Encoded immortal era.
pub const IMMORTAL_ERA: u8 = 0x00;
/// Payloads longer than this are hashed before signing.
const MAX_UNHASHED_PAYLOAD: usize = 256;

pub type AccountId = [u8; 32];
pub type BlockNumber = u32;

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub enum MultiAddress {
    Id(AccountId),
    Index(#[codec(compact)] u32),
    Raw(Vec<u8>),
    Address32([u8; 32]),
    Address20([u8; 20]),
}

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub enum MultiSignature {
    Ed25519([u8; 64]),
    Sr25519([u8; 64]),
    Ecdsa([u8; 65]),
}

impl MultiSignature {
    /// Raw signature bytes used to find the extrinsic again in a block.
    pub fn signature_bytes(&self) -> Result<[u8; 64], SubstrateError> {
        match self {
            Self::Ed25519(bytes) | Self::Sr25519(bytes) => Ok(*bytes),
            Self::Ecdsa(_) => Err(SubstrateError::UnsupportedSignature),
        }
    }

    fn matches(&self, signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(bytes) | Self::Sr25519(bytes) => bytes.as_slice() == signature,
            Self::Ecdsa(_) => false,
        }
    }
}

/// Pallet call with its already SCALE encoded arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub pallet_index: u8,
    pub call_index: u8,
    pub args: Vec<u8>,
}

impl Call {
    pub fn new(pallet_index: u8, call_index: u8, args: impl Encode) -> Self {
        Self { pallet_index, call_index, args: args.encode() }
    }
}

impl Encode for Call {
    fn size_hint(&self) -> usize {
        2 + self.args.len()
    }

    fn encode_to<T: parity_scale_codec::Output + ?Sized>(&self, dest: &mut T) {
        dest.push_byte(self.pallet_index);
        dest.push_byte(self.call_index);
        dest.write(&self.args);
    }
}

/// Values the signature commits to besides the call itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureOptions {
    pub nonce: u32,
    pub tip: u128,
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: H256,
}

impl SignatureOptions {
    /// Bytes the signer signs: blake2-256 hashed when longer than 256 bytes.
    pub fn signing_payload(&self, call: &Call) -> Vec<u8> {
        let mut payload = call.encode();
        payload.push(IMMORTAL_ERA);
        Compact(self.nonce).encode_to(&mut payload);
        Compact(self.tip).encode_to(&mut payload);
        self.spec_version.encode_to(&mut payload);
        self.transaction_version.encode_to(&mut payload);
        // immortal era: the checkpoint block is the genesis block
        payload.extend_from_slice(self.genesis_hash.as_bytes());
        payload.extend_from_slice(self.genesis_hash.as_bytes());

        if payload.len() > MAX_UNHASHED_PAYLOAD {
            blake2_256(&payload).to_vec()
        } else {
            payload
        }
    }
}

/// Encodes a signed extrinsic, length prefixed, ready for `author_submitExtrinsic`.
pub fn encode_signed_extrinsic(
    signer: AccountId,
    signature: &MultiSignature,
    options: &SignatureOptions,
    call: &Call,
) -> Vec<u8> {
    let mut body = vec![SIGNED_EXTRINSIC_VERSION];
    MultiAddress::Id(signer).encode_to(&mut body);
    signature.encode_to(&mut body);
    body.push(IMMORTAL_ERA);
    Compact(options.nonce).encode_to(&mut body);
    Compact(options.tip).encode_to(&mut body);
    call.encode_to(&mut body);
    body.encode()
}

/// Extracts the signature of an encoded extrinsic, `None` for unsigned ones.
pub fn decode_extrinsic_signature(raw: &[u8]) -> Result<Option<MultiSignature>, SubstrateError> {
    let input = &mut &raw[..];
    Compact::<u32>::decode(input).map_err(|e| SubstrateError::decode("extrinsic length", e))?;
    let version = u8::decode(input).map_err(|e| SubstrateError::decode("extrinsic version", e))?;
    if version & 0x80 == 0 {
        return Ok(None);
    }
    MultiAddress::decode(input).map_err(|e| SubstrateError::decode("extrinsic signer", e))?;
    let signature = MultiSignature::decode(input).map_err(|e| SubstrateError::decode("extrinsic signature", e))?;
    Ok(Some(signature))
}

/// Index of the extrinsic carrying `signature` within `extrinsics`.
pub fn find_extrinsic_index(extrinsics: &[Vec<u8>], signature: &[u8]) -> Option<u32> {
    extrinsics
        .iter()
        .position(|raw| matches!(decode_extrinsic_signature(raw), Ok(Some(s)) if s.matches(signature)))
        .map(|idx| idx as u32)
}

/// Storage key of `System.Account` for `account`.
pub fn system_account_key(account: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 16 + 16 + 32);
    key.extend_from_slice(&twox_128(b"System"));
    key.extend_from_slice(&twox_128(b"Account"));
    key.extend_from_slice(&blake2_128(account));
    key.extend_from_slice(account);
    key
}

/// Reads the sequence number, the leading field of the encoded account info.
pub fn decode_account_nonce(raw: &[u8]) -> Result<u32, SubstrateError> {
    u32::decode(&mut &raw[..]).map_err(|e| SubstrateError::decode("account info", e))
}
