use anchor_submitter_client_interface::AccountLocks;
use tokio::sync::OwnedMutexGuard;

use crate::types::jobs::JobId;
use crate::types::AccountId;

/// In-process lock table serializing read-modify-write cycles on one job.
///
/// Across processes the repository version check is what rejects stale writes.
#[derive(Default)]
pub struct JobLocks {
    locks: AccountLocks<(AccountId, JobId)>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, account: &AccountId, id: &JobId) -> OwnedMutexGuard<()> {
        self.locks.lock(&(*account, *id)).await
    }

    pub fn prune(&self) {
        self.locks.prune();
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
