use std::sync::Arc;

use anchor_submitter_client_interface::{AccountLocks, CacheConfig, RetryPolicyProvider};
use sp_core::H256;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::SubstrateApi;
use crate::error::SubstrateError;
use crate::extrinsic::{encode_signed_extrinsic, AccountId, BlockNumber, Call, MultiSignature, SignatureOptions};
use crate::sequence::SequenceAllocator;
use crate::signer::Signer;

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedExtrinsic {
    pub tx_hash: H256,
    /// Chain head before submission, the first block the extrinsic can be included in.
    pub reference_block: BlockNumber,
    pub signature: MultiSignature,
    pub sequence: u32,
}

pub struct ExtrinsicSubmitter<A: ?Sized> {
    api: Arc<A>,
    sequences: SequenceAllocator<A>,
    locks: AccountLocks<AccountId>,
    policy: Arc<dyn RetryPolicyProvider>,
}

impl<A> ExtrinsicSubmitter<A>
where
    A: SubstrateApi + ?Sized,
{
    pub fn new(api: Arc<A>, policy: Arc<dyn RetryPolicyProvider>, sequence_cache: CacheConfig) -> Self {
        Self { sequences: SequenceAllocator::new(api.clone(), sequence_cache), api, locks: AccountLocks::new(), policy }
    }

    /// Signs and submits `call`, refreshing the sequence from chain storage whenever the pool rejects it.
    pub async fn submit_extrinsic(
        &self,
        call: &Call,
        signer: &dyn Signer,
    ) -> Result<SubmittedExtrinsic, SubstrateError> {
        let account = signer.account_id();
        let policy = self.policy.retry_policy();
        let mut attempts = policy.attempts();

        let result = {
            let _guard = self.locks.lock(&account).await;
            loop {
                let Some(attempt) = attempts.next_attempt() else {
                    error!(
                        account = %hex::encode(account),
                        attempts = attempts.used(),
                        "max concurrent transaction tries reached"
                    );
                    break Err(SubstrateError::MaxRetriesReached { attempts: attempts.used() });
                };

                let sequence = match self.sequences.current(&account).await {
                    Ok(sequence) => sequence,
                    Err(e) => break Err(e),
                };

                match self.submit_once(call, sequence, signer).await {
                    Ok(submitted) => {
                        info!(
                            tx_hash = ?submitted.tx_hash,
                            sequence,
                            reference_block = submitted.reference_block,
                            "Successfully submitted extrinsic"
                        );
                        self.sequences.increment(&account);
                        break Ok(submitted);
                    }
                    Err(e) if e.is_nonce_collision() => {
                        warn!(
                            account = %hex::encode(account),
                            sequence,
                            attempt,
                            max_retries = attempts.max(),
                            error = %e,
                            "Concurrent transaction identified, trying again"
                        );
                        if let Err(refresh) = self.sequences.refresh(&account).await {
                            break Err(refresh);
                        }
                        sleep(policy.retry_interval()).await;
                    }
                    Err(e) => break Err(e),
                }
            }
        };

        self.locks.prune();
        result
    }

    async fn submit_once(
        &self,
        call: &Call,
        sequence: u32,
        signer: &dyn Signer,
    ) -> Result<SubmittedExtrinsic, SubstrateError> {
        let genesis_hash = self.api.get_block_hash(0).await?;
        let runtime = self.api.get_runtime_version_latest().await?;

        let options = SignatureOptions {
            nonce: sequence,
            tip: 0,
            spec_version: runtime.spec_version,
            transaction_version: runtime.transaction_version,
            genesis_hash,
        };
        let signature = signer.sign(&options.signing_payload(call));
        let encoded = encode_signed_extrinsic(signer.account_id(), &signature, &options, call);

        let reference_block = self.api.get_block_latest().await?.block.header.number;
        let tx_hash = self.api.submit_extrinsic(encoded).await?;
        Ok(SubmittedExtrinsic { tx_hash, reference_block, signature, sequence })
    }

    pub fn sequences(&self) -> &SequenceAllocator<A> {
        &self.sequences
    }

    pub fn api(&self) -> Arc<A> {
        self.api.clone()
    }
}
