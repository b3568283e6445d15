use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use anchor_submitter_client_interface::{CacheConfig, RetryPolicy};
use assert_matches::assert_matches;
use rstest::rstest;

use crate::clients::{AnchorCommit, AnchorRepositoryApi, MockAnchorRepositoryApi};
use crate::error::{EthereumError, NONCE_TOO_LOW, REPLACEMENT_UNDERPRICED};
use crate::nonce::{MockEthereumNonceApi, NonceAllocator};
use crate::submitter::TransactionSubmitter;

const SENDER: Address = Address::repeat_byte(0x11);

fn chain_api(chain_nonce: u64, pool: Vec<&'static str>) -> MockEthereumNonceApi {
    let mut api = MockEthereumNonceApi::new();
    api.expect_pending_nonce_at().returning(move |_| Ok(chain_nonce));
    api.expect_txpool_pending_nonces().returning(move |_| Ok(pool.iter().map(|n| n.to_string()).collect()));
    api
}

fn submitter(api: MockEthereumNonceApi, max_retries: u32, txpool: bool) -> TransactionSubmitter<MockEthereumNonceApi> {
    TransactionSubmitter::new(
        Arc::new(api),
        Arc::new(RetryPolicy::new(max_retries, Duration::from_millis(1))),
        txpool,
        CacheConfig::default(),
    )
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4)]
#[tokio::test]
async fn collisions_then_success_uses_one_extra_attempt(#[case] collisions: u32) {
    let submitter = submitter(chain_api(3, vec![]), 5, true);
    let calls = AtomicU32::new(0);

    let result = submitter
        .submit(SENDER, |nonce| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < collisions {
                    Err(EthereumError::Rpc(NONCE_TOO_LOW.to_string()))
                } else {
                    Ok(nonce)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), collisions + 1);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(5)]
#[tokio::test]
async fn permanent_collision_exhausts_retry_budget(#[case] max_retries: u32) {
    let submitter = submitter(chain_api(3, vec![]), max_retries, true);
    let calls = AtomicU32::new(0);

    let result: Result<B256, _> = submitter
        .submit(SENDER, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EthereumError::Rpc(REPLACEMENT_UNDERPRICED.to_string())) }
        })
        .await;

    let err = result.unwrap_err();
    assert_matches!(err, EthereumError::MaxRetriesReached { attempts } if attempts == max_retries);
    assert_eq!(err.to_string(), "max concurrent transaction tries reached");
    assert_eq!(calls.load(Ordering::SeqCst), max_retries);
}

#[tokio::test]
async fn other_errors_are_returned_without_retry() {
    let submitter = submitter(chain_api(3, vec![]), 5, true);
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = submitter
        .submit(SENDER, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EthereumError::Rpc("insufficient funds for gas * price + value".to_string())) }
        })
        .await;

    assert_matches!(result, Err(EthereumError::Rpc(message)) if message.starts_with("insufficient funds"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_retry_budget_never_calls() {
    let submitter = submitter(chain_api(3, vec![]), 0, true);
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = submitter
        .submit(SENDER, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

    assert_matches!(result, Err(EthereumError::MaxRetriesReached { attempts: 0 }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case(8, vec!["7", "9"], 10)]
#[case(8, vec!["8"], 9)]
#[case(8, vec!["3", "5"], 8)]
#[case(8, vec![], 8)]
#[tokio::test]
async fn txpool_nonces_ahead_of_chain_are_skipped(
    #[case] chain_nonce: u64,
    #[case] pool: Vec<&'static str>,
    #[case] expected: u64,
) {
    let allocator = NonceAllocator::new(Arc::new(chain_api(chain_nonce, pool)), true, CacheConfig::default());
    assert_eq!(allocator.next_nonce(SENDER).await.unwrap(), expected);
}

#[tokio::test]
async fn malformed_txpool_nonce_is_rejected() {
    let allocator = NonceAllocator::new(Arc::new(chain_api(2, vec!["0x5"])), true, CacheConfig::default());
    assert_matches!(allocator.next_nonce(SENDER).await, Err(EthereumError::InvalidPoolNonce(raw)) if raw == "0x5");
}

#[tokio::test]
async fn txpool_failure_is_terminal() {
    let mut api = MockEthereumNonceApi::new();
    api.expect_pending_nonce_at().returning(|_| Ok(1));
    api.expect_txpool_pending_nonces().returning(|_| Err(EthereumError::Rpc("method not found".to_string())));
    let allocator = NonceAllocator::new(Arc::new(api), true, CacheConfig::default());

    let err = allocator.next_nonce(SENDER).await.unwrap_err();
    assert_matches!(err, EthereumError::TxPool(_));
    assert!(err.to_string().starts_with("failed to get txpool data"));
}

#[tokio::test]
async fn chain_nonce_failure_is_reported() {
    let mut api = MockEthereumNonceApi::new();
    api.expect_pending_nonce_at().returning(|_| Err(EthereumError::Transport("connection refused".to_string())));
    let allocator = NonceAllocator::new(Arc::new(api), true, CacheConfig::default());

    assert_matches!(
        allocator.next_nonce(SENDER).await,
        Err(EthereumError::ChainNonce { account, .. }) if account == SENDER
    );
}

#[tokio::test]
async fn degraded_mode_uses_last_recorded_nonce() {
    let mut api = MockEthereumNonceApi::new();
    api.expect_pending_nonce_at().returning(|_| Ok(5));
    api.expect_txpool_pending_nonces().never();
    let allocator = NonceAllocator::new(Arc::new(api), false, CacheConfig::default());

    assert_eq!(allocator.next_nonce(SENDER).await.unwrap(), 5);
    allocator.record_used(SENDER, 9);
    assert_eq!(allocator.next_nonce(SENDER).await.unwrap(), 10);
    allocator.invalidate(SENDER);
    assert_eq!(allocator.next_nonce(SENDER).await.unwrap(), 5);
}

#[tokio::test]
async fn degraded_mode_prefers_chain_when_it_moved_ahead() {
    let allocator = NonceAllocator::new(Arc::new(chain_api(12, vec![])), false, CacheConfig::default());
    allocator.record_used(SENDER, 4);
    assert_eq!(allocator.next_nonce(SENDER).await.unwrap(), 12);
}

#[tokio::test]
async fn concurrent_submissions_from_one_account_get_distinct_nonces() {
    let submitter = Arc::new(submitter(chain_api(5, vec![]), 3, false));
    let used = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let submitter = submitter.clone();
            let used = used.clone();
            tokio::spawn(async move {
                submitter
                    .submit(SENDER, move |nonce| {
                        let used = used.clone();
                        async move {
                            tokio::time::sleep(Duration::from_millis(2)).await;
                            used.lock().unwrap().push(nonce);
                            Ok::<_, EthereumError>(nonce)
                        }
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut nonces = used.lock().unwrap().clone();
    nonces.sort_unstable();
    assert_eq!(nonces, vec![5, 6, 7, 8]);
}

#[tokio::test]
async fn successful_submission_records_the_used_nonce() {
    let submitter = submitter(chain_api(1, vec![]), 1, true);
    submitter.submit(SENDER, |nonce| async move { Ok::<_, EthereumError>(nonce) }).await.unwrap();
    assert_eq!(submitter.nonce_allocator().tracked_accounts(), 1);
}

#[tokio::test]
async fn anchor_commit_is_resent_after_a_nonce_collision() {
    let repository = Address::repeat_byte(0x22);
    let commit = AnchorCommit { anchor_id: U256::from(9), document_root: B256::repeat_byte(0xaa), proofs: vec![] };
    let mut client = MockAnchorRepositoryApi::new();
    let mut seq = mockall::Sequence::new();
    client
        .expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _, _| Err(EthereumError::Rpc(NONCE_TOO_LOW.to_string())));
    client
        .expect_commit()
        .withf(move |to, from, nonce, sent| {
            *to == repository && *from == SENDER && *nonce == 4 && sent.anchor_id == U256::from(9)
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _, _| Ok(B256::repeat_byte(0x77)));
    let client: Arc<dyn AnchorRepositoryApi> = Arc::new(client);
    let submitter = submitter(chain_api(4, vec![]), 3, true);

    let tx_hash = submitter
        .submit(SENDER, |nonce| {
            let client = client.clone();
            let commit = commit.clone();
            async move { client.commit(repository, SENDER, nonce, commit).await }
        })
        .await
        .unwrap();

    assert_eq!(tx_hash, B256::repeat_byte(0x77));
}
