use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anchor_submitter_client_interface::{CacheConfig, RetryPolicy};
use assert_matches::assert_matches;
use parity_scale_codec::Encode;
use rstest::rstest;
use sp_core::H256;

use crate::api::{
    Block, ChainEvent, Header, MockEventRetriever, MockSubstrateApi, Phase, RuntimeVersion, SignedBlock,
    EXTRINSIC_SUCCESS_EVENT,
};
use crate::error::SubstrateError;
use crate::extrinsic::{decode_extrinsic_signature, system_account_key, AccountId, Call, MultiSignature};
use crate::signer::Signer;
use crate::status::{lookup_extrinsic, ExtrinsicLookup};
use crate::submitter::ExtrinsicSubmitter;

const ACCOUNT: AccountId = [0x22; 32];
const GENESIS: H256 = H256::repeat_byte(0x01);
const HEAD: u32 = 100;

struct StaticSigner;

impl Signer for StaticSigner {
    fn account_id(&self) -> AccountId {
        ACCOUNT
    }

    fn sign(&self, payload: &[u8]) -> MultiSignature {
        let mut bytes = [0u8; 64];
        let len = payload.len().min(64);
        bytes[..len].copy_from_slice(&payload[..len]);
        MultiSignature::Sr25519(bytes)
    }
}

fn block(number: u32, extrinsics: Vec<Vec<u8>>) -> SignedBlock {
    SignedBlock { block: Block { header: Header { number }, extrinsics } }
}

fn account_info(nonce: u32) -> Vec<u8> {
    let mut info = nonce.encode();
    info.extend(1u32.encode());
    info
}

/// Node with fixed chain metadata; storage reads answer from `chain_nonces` in order, repeating the last one.
fn node(chain_nonces: Vec<u32>, storage_reads: Arc<AtomicU32>) -> MockSubstrateApi {
    let mut api = MockSubstrateApi::new();
    api.expect_get_block_hash().withf(|n| *n == 0).returning(|_| Ok(GENESIS));
    api.expect_get_runtime_version_latest()
        .returning(|| Ok(RuntimeVersion { spec_version: 10, transaction_version: 1 }));
    api.expect_get_block_latest().returning(|| Ok(block(HEAD, vec![])));
    api.expect_get_storage_latest().withf(|key| *key == system_account_key(&ACCOUNT)).returning(move |_| {
        let read = storage_reads.fetch_add(1, Ordering::SeqCst) as usize;
        let nonce = chain_nonces[read.min(chain_nonces.len() - 1)];
        Ok(Some(account_info(nonce)))
    });
    api
}

fn submitter(api: MockSubstrateApi, max_retries: u32) -> ExtrinsicSubmitter<MockSubstrateApi> {
    ExtrinsicSubmitter::new(
        Arc::new(api),
        Arc::new(RetryPolicy::new(max_retries, Duration::from_millis(1))),
        CacheConfig::default(),
    )
}

fn call() -> Call {
    Call::new(40, 3, (H256::repeat_byte(9), 7u64))
}

#[tokio::test]
async fn successive_submissions_use_cached_sequence() {
    let reads = Arc::new(AtomicU32::new(0));
    let mut api = node(vec![4], reads.clone());
    api.expect_submit_extrinsic()
        .times(2)
        .returning(|encoded| Ok(H256::from_slice(&sp_core::hashing::blake2_256(&encoded))));
    let submitter = submitter(api, 3);

    let first = submitter.submit_extrinsic(&call(), &StaticSigner).await.unwrap();
    let second = submitter.submit_extrinsic(&call(), &StaticSigner).await.unwrap();

    assert_eq!(first.sequence, 4);
    assert_eq!(second.sequence, 5);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn collision_refreshes_sequence_with_one_storage_read() {
    let reads = Arc::new(AtomicU32::new(0));
    let mut api = node(vec![4, 6], reads.clone());
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let calls = submitted.clone();
    api.expect_submit_extrinsic().times(2).returning(move |encoded| {
        let mut calls = calls.lock().unwrap();
        calls.push(encoded);
        if calls.len() == 1 {
            Err(SubstrateError::Rpc("Priority is too low: (4 vs 4)".to_string()))
        } else {
            Ok(H256::repeat_byte(0xaa))
        }
    });
    let submitter = submitter(api, 3);

    let result = submitter.submit_extrinsic(&call(), &StaticSigner).await.unwrap();

    assert_eq!(result.sequence, 6);
    assert_eq!(result.tx_hash, H256::repeat_byte(0xaa));
    // first use plus exactly one refresh
    assert_eq!(reads.load(Ordering::SeqCst), 2);
    assert_eq!(submitter.sequences().current(&ACCOUNT).await.unwrap(), 7);
}

#[rstest]
#[case(1)]
#[case(3)]
#[tokio::test]
async fn persistent_rejection_exhausts_retries(#[case] max_retries: u32) {
    let reads = Arc::new(AtomicU32::new(0));
    let mut api = node(vec![4], reads.clone());
    api.expect_submit_extrinsic()
        .times(max_retries as usize)
        .returning(|_| Err(SubstrateError::Rpc("Invalid Transaction: Transaction is outdated".to_string())));
    let submitter = submitter(api, max_retries);

    let err = submitter.submit_extrinsic(&call(), &StaticSigner).await.unwrap_err();

    assert_matches!(err, SubstrateError::MaxRetriesReached { attempts } if attempts == max_retries);
    assert_eq!(reads.load(Ordering::SeqCst), max_retries + 1);
}

#[tokio::test]
async fn other_rejections_are_terminal() {
    let reads = Arc::new(AtomicU32::new(0));
    let mut api = node(vec![4], reads.clone());
    api.expect_submit_extrinsic()
        .times(1)
        .returning(|_| Err(SubstrateError::Rpc("Transaction has a bad signature".to_string())));
    let submitter = submitter(api, 5);

    let err = submitter.submit_extrinsic(&call(), &StaticSigner).await.unwrap_err();

    assert_matches!(err, SubstrateError::Rpc(message) if message == "Transaction has a bad signature");
    assert_eq!(submitter.sequences().current(&ACCOUNT).await.unwrap(), 4);
}

#[tokio::test]
async fn submission_reports_head_and_signature() {
    let reads = Arc::new(AtomicU32::new(0));
    let mut api = node(vec![0], reads);
    let encoded_extrinsic = Arc::new(Mutex::new(None));
    let captured = encoded_extrinsic.clone();
    api.expect_submit_extrinsic().times(1).returning(move |encoded| {
        *captured.lock().unwrap() = Some(encoded);
        Ok(H256::repeat_byte(0xbb))
    });
    let submitter = submitter(api, 1);

    let result = submitter.submit_extrinsic(&call(), &StaticSigner).await.unwrap();

    assert_eq!(result.reference_block, HEAD);
    let encoded = encoded_extrinsic.lock().unwrap().clone().unwrap();
    assert_eq!(decode_extrinsic_signature(&encoded).unwrap(), Some(result.signature));
}

#[tokio::test]
async fn missing_account_storage_starts_at_zero() {
    let mut api = MockSubstrateApi::new();
    api.expect_get_storage_latest().returning(|_| Ok(None));
    let submitter = submitter(api, 1);

    assert_eq!(submitter.sequences().chain_sequence(&ACCOUNT).await.unwrap(), 0);
}

#[tokio::test]
async fn lookup_reports_block_not_ready() {
    let mut api = MockSubstrateApi::new();
    api.expect_get_block_hash().returning(|_| Err(SubstrateError::BlockNotReady));
    let events = MockEventRetriever::new();

    let lookup = lookup_extrinsic(&api, &events, H256::zero(), 12, &[1u8; 64]).await.unwrap();
    assert_eq!(lookup, ExtrinsicLookup::BlockNotReady);
}

#[tokio::test]
async fn lookup_finds_extrinsic_and_checks_events() {
    let signature = MultiSignature::Sr25519([5u8; 64]);
    let options = crate::extrinsic::SignatureOptions {
        nonce: 1,
        tip: 0,
        spec_version: 1,
        transaction_version: 1,
        genesis_hash: GENESIS,
    };
    let ours = crate::extrinsic::encode_signed_extrinsic(ACCOUNT, &signature, &options, &call());
    let inherent = vec![0x04u8, 3, 0].encode();
    let block_hash = H256::repeat_byte(0x33);

    let mut api = MockSubstrateApi::new();
    api.expect_get_block_hash().withf(|n| *n == 12).returning(move |_| Ok(block_hash));
    api.expect_get_block().returning(move |_| Ok(block(12, vec![inherent.clone(), ours.clone()])));
    let mut events = MockEventRetriever::new();
    events.expect_events().returning(|_| {
        Ok(vec![ChainEvent { name: EXTRINSIC_SUCCESS_EVENT.to_string(), phase: Phase::ApplyExtrinsic(1) }])
    });

    let lookup = lookup_extrinsic(&api, &events, H256::zero(), 12, &[5u8; 64]).await.unwrap();
    assert_matches!(lookup, ExtrinsicLookup::Found(info) if info.index == 1 && info.block_hash == block_hash);

    let missing = lookup_extrinsic(&api, &events, H256::zero(), 12, &[6u8; 64]).await.unwrap();
    assert_eq!(missing, ExtrinsicLookup::NotInBlock);
}
