use std::sync::Arc;

use anchor_ethereum_submitter::clients::{AnchorRepositoryApi, NftRegistryApi};
use anchor_ethereum_submitter::{EthereumNonceApi, EthereumReadApi, TransactionSubmitter};
use anchor_submitter_client_interface::RetryPolicyProvider;
use anchor_substrate_submitter::{EventRetriever, ExtrinsicSubmitter, Signer, SubstrateApi};
use tracing::info;

use crate::config::{AnchorConfig, DatabaseBackend};
use crate::core::client::database::{InMemoryStore, JobRepository, KeyValueStore, KvJobRepository, RocksDbStore};
use crate::core::client::notification::{NotificationSender, WebhookSender};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::worker::service::{JobManager, JobService};
use crate::worker::task_chain::StepPolicy;
use crate::worker::tasks::{
    AnchorConfirmationTask, ExtrinsicStatusTask, TaskDispatcher, TransactionStatusTask, WaitForEventTask,
};
use crate::worker::workflows::anchor::AnchorWorkflow;
use crate::worker::workflows::nft::{
    DocumentService, MintNftWorkflow, NftChainApi, NftClients, SubstrateNftChain, TransferNftWorkflow,
};

/// Chain and document clients built by the caller once per process.
#[derive(Clone)]
pub struct ChainClients {
    pub ethereum_nonce: Arc<dyn EthereumNonceApi>,
    pub ethereum_read: Arc<dyn EthereumReadApi>,
    pub nft_registry: Arc<dyn NftRegistryApi>,
    pub anchor_repository: Arc<dyn AnchorRepositoryApi>,
    pub substrate: Arc<dyn SubstrateApi>,
    pub substrate_events: Arc<dyn EventRetriever>,
    pub substrate_signer: Arc<dyn Signer>,
    pub documents: Arc<dyn DocumentService>,
}

/// Everything the orchestrator runs on, wired from the configuration.
pub struct AppContext {
    config: AnchorConfig,
    jobs: Arc<dyn JobManager>,
    dispatcher: Arc<TaskDispatcher>,
    transaction_submitter: Arc<TransactionSubmitter<dyn EthereumNonceApi>>,
    extrinsic_submitter: Arc<ExtrinsicSubmitter<dyn SubstrateApi>>,
    mint_nft: MintNftWorkflow,
    transfer_nft: TransferNftWorkflow,
    anchor: AnchorWorkflow,
}

impl AppContext {
    pub fn new(config: AnchorConfig, clients: ChainClients) -> OrchestratorResult<Self> {
        let store = open_store(&config)?;
        let repo: Arc<dyn JobRepository> = Arc::new(KvJobRepository::new(store));
        let notifier: Arc<dyn NotificationSender> =
            Arc::new(WebhookSender::new(config.notification.webhook_url.clone(), config.notification.timeout())?);
        let jobs: Arc<dyn JobManager> = Arc::new(JobService::new(
            repo,
            notifier,
            config.jobs.wait_poll_interval(),
            config.jobs.default_task_timeout(),
        ));

        let policy = StepPolicy::from(&config.jobs.step_policy);
        let ethereum_policy: Arc<dyn RetryPolicyProvider> = Arc::new(config.ethereum.clone());
        let substrate_policy: Arc<dyn RetryPolicyProvider> = Arc::new(config.substrate.clone());

        let mut dispatcher = TaskDispatcher::new(jobs.clone(), policy);
        dispatcher.register(Arc::new(ExtrinsicStatusTask::new(
            clients.substrate.clone(),
            clients.substrate_events.clone(),
            substrate_policy.clone(),
        )));
        dispatcher.register(Arc::new(WaitForEventTask::new(clients.ethereum_read.clone())));
        dispatcher.register(Arc::new(TransactionStatusTask::new(clients.ethereum_read.clone())));
        dispatcher.register(Arc::new(AnchorConfirmationTask::new(clients.anchor_repository.clone())));
        let dispatcher = Arc::new(dispatcher);

        let transaction_submitter = Arc::new(TransactionSubmitter::new(
            clients.ethereum_nonce.clone(),
            ethereum_policy,
            config.ethereum.txpool_access_enabled,
            config.ethereum.nonce_cache,
        ));
        let extrinsic_submitter = Arc::new(ExtrinsicSubmitter::new(
            clients.substrate.clone(),
            substrate_policy,
            config.substrate.sequence_cache,
        ));

        let chain: Arc<dyn NftChainApi> = Arc::new(SubstrateNftChain::new(
            extrinsic_submitter.clone(),
            clients.substrate_signer.clone(),
            jobs.clone(),
            dispatcher.clone(),
            config.substrate.validate_mint_call_index,
        ));
        let anchor = AnchorWorkflow::new(
            clients.anchor_repository,
            transaction_submitter.clone(),
            jobs.clone(),
            dispatcher.clone(),
        );
        let nft_clients = Arc::new(NftClients {
            documents: clients.documents,
            chain,
            registry: clients.nft_registry,
            ethereum: clients.ethereum_read,
            submitter: transaction_submitter.clone(),
            jobs: jobs.clone(),
        });
        let mint_nft = MintNftWorkflow::new(nft_clients.clone(), policy)?;
        let transfer_nft = TransferNftWorkflow::new(nft_clients, policy)?;

        info!(backend = ?config.database.backend, "Orchestrator context initialized");
        Ok(Self {
            config,
            jobs,
            dispatcher,
            transaction_submitter,
            extrinsic_submitter,
            mint_nft,
            transfer_nft,
            anchor,
        })
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn jobs(&self) -> Arc<dyn JobManager> {
        self.jobs.clone()
    }

    pub fn dispatcher(&self) -> Arc<TaskDispatcher> {
        self.dispatcher.clone()
    }

    pub fn transaction_submitter(&self) -> Arc<TransactionSubmitter<dyn EthereumNonceApi>> {
        self.transaction_submitter.clone()
    }

    pub fn extrinsic_submitter(&self) -> Arc<ExtrinsicSubmitter<dyn SubstrateApi>> {
        self.extrinsic_submitter.clone()
    }

    pub fn mint_nft(&self) -> &MintNftWorkflow {
        &self.mint_nft
    }

    pub fn transfer_nft(&self) -> &TransferNftWorkflow {
        &self.transfer_nft
    }

    pub fn anchor(&self) -> &AnchorWorkflow {
        &self.anchor
    }
}

fn open_store(config: &AnchorConfig) -> OrchestratorResult<Arc<dyn KeyValueStore>> {
    match config.database.backend {
        DatabaseBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        DatabaseBackend::RocksDb => {
            let path = config
                .database
                .path
                .as_deref()
                .ok_or_else(|| OrchestratorError::ConfigError("database.path is required for rocksdb".to_string()))?;
            Ok(Arc::new(RocksDbStore::open(path)?))
        }
    }
}
