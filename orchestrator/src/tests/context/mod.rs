use std::sync::Arc;

use anchor_ethereum_submitter::clients::{MockAnchorRepositoryApi, MockNftRegistryApi};
use anchor_ethereum_submitter::{MockEthereumNonceApi, MockEthereumReadApi};
use anchor_substrate_submitter::{MockEventRetriever, MockSubstrateApi, Sr25519Signer};
use assert_matches::assert_matches;
use futures::FutureExt;
use rstest::*;
use sp_core::{sr25519, Pair};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{AnchorConfig, DatabaseBackend, DatabaseConfig, EthereumConfig, SubstrateConfig};
use crate::context::{AppContext, ChainClients};
use crate::error::OrchestratorError;
use crate::tests::common::account;
use crate::types::jobs::JobStatus;
use crate::types::params::{
    ANCHOR_CONFIRMATION_TASK, EXTRINSIC_STATUS_TASK, TRANSACTION_STATUS_TASK, WAIT_FOR_EVENT_TASK,
};
use crate::types::AccountId;
use crate::worker::service::JobWork;
use crate::worker::workflows::nft::collaborators::MockDocumentService;

fn config(database: DatabaseConfig) -> AnchorConfig {
    AnchorConfig {
        ethereum: EthereumConfig::new(Url::parse("http://localhost:8545").unwrap()),
        substrate: SubstrateConfig::new(Url::parse("ws://localhost:9944").unwrap(), [40, 3]),
        jobs: Default::default(),
        database,
        notification: Default::default(),
    }
}

fn clients() -> ChainClients {
    ChainClients {
        ethereum_nonce: Arc::new(MockEthereumNonceApi::new()),
        ethereum_read: Arc::new(MockEthereumReadApi::new()),
        nft_registry: Arc::new(MockNftRegistryApi::new()),
        anchor_repository: Arc::new(MockAnchorRepositoryApi::new()),
        substrate: Arc::new(MockSubstrateApi::new()),
        substrate_events: Arc::new(MockEventRetriever::new()),
        substrate_signer: Arc::new(Sr25519Signer::new(sr25519::Pair::from_seed(&[7; 32]))),
        documents: Arc::new(MockDocumentService::new()),
    }
}

#[rstest]
#[tokio::test]
async fn context_registers_every_queued_task() {
    let context = AppContext::new(config(DatabaseConfig::default()), clients()).unwrap();

    for task in [EXTRINSIC_STATUS_TASK, WAIT_FOR_EVENT_TASK, TRANSACTION_STATUS_TASK, ANCHOR_CONFIRMATION_TASK] {
        assert!(context.dispatcher().is_registered(task), "{task} is not registered");
    }
    assert_eq!(context.config().substrate.validate_mint_call_index, [40, 3]);
    assert_eq!(context.mint_nft().runner().chain().name(), crate::worker::workflows::nft::mint::MINT_NFT_JOB);
}

#[rstest]
#[tokio::test]
async fn context_runs_jobs_on_rocksdb(account: AccountId) {
    let dir = TempDir::new().unwrap();
    let database = DatabaseConfig { backend: DatabaseBackend::RocksDb, path: Some(dir.path().join("jobs")) };
    let context = AppContext::new(config(database), clients()).unwrap();
    let jobs = context.jobs();

    let work: JobWork = Box::new(|_ctx| async { Ok(()) }.boxed());
    let handle = jobs
        .execute_within_job(account, None, "Mint NFT Job".to_string(), work, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Success);
    let listed = jobs.list_jobs(&account).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, handle.job_id);
}

#[test]
fn rocksdb_without_path_is_a_config_error() {
    let database = DatabaseConfig { backend: DatabaseBackend::RocksDb, path: None };

    let result = AppContext::new(config(database), clients());

    assert_matches!(result, Err(OrchestratorError::ConfigError(_)));
}
