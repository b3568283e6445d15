use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::FutureExt;
use rstest::*;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::core::client::notification::{MockNotificationSender, NotificationError, NotificationStatus};
use crate::error::JobError;
use crate::tests::common::{account, silent_notifier, test_jobs, TestJobs};
use crate::types::jobs::{JobId, JobStatus};
use crate::types::AccountId;
use crate::worker::service::{JobManager, JobWork};

fn succeed() -> JobWork {
    Box::new(|_| async { Ok(()) }.boxed())
}

fn fail(message: &'static str) -> JobWork {
    Box::new(move |_| async move { Err(JobError::other(message)) }.boxed())
}

fn never_finish() -> JobWork {
    Box::new(|_| futures::future::pending().boxed())
}

/// Work that succeeds is persisted as Success before `done` fires, then notified once.
#[rstest]
#[tokio::test]
async fn successful_work_completes_new_job(account: AccountId) {
    let mut notifier = MockNotificationSender::new();
    notifier
        .expect_send()
        .withf(move |message| message.account_id == account && message.status == JobStatus::Success)
        .times(1)
        .returning(|_| Ok(NotificationStatus::Sent));
    let jobs = TestJobs::new(notifier);

    let handle = jobs
        .service
        .execute_within_job(account, None, "Mint NFT Job".to_string(), succeed(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Success);
    let job = jobs.service.get_job(&account, &handle.job_id).await.unwrap();
    assert!(job.is_successful());
    assert_eq!(job.description, "Mint NFT Job");
    jobs.service.wait_for_job(&account, &handle.job_id).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn failed_work_records_manager_log(account: AccountId, test_jobs: TestJobs) {
    let handle = test_jobs
        .service
        .execute_within_job(
            account,
            None,
            "Transfer NFT Job".to_string(),
            fail("owner mismatch"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Failed);
    let job = test_jobs.service.get_job(&account, &handle.job_id).await.unwrap();
    let log = job.last_log().unwrap();
    assert_eq!(log.action, "manager[Transfer NFT Job]");
    assert_eq!(log.message, "owner mismatch");

    let status = test_jobs.service.get_job_status(&account, &handle.job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.message, "owner mismatch");
}

#[rstest]
#[tokio::test]
async fn wait_for_job_reports_failure_message(account: AccountId, test_jobs: TestJobs) {
    let handle = test_jobs
        .service
        .execute_within_job(account, None, "failing".to_string(), fail("boom"), CancellationToken::new())
        .await
        .unwrap();

    let result = test_jobs.service.wait_for_job(&account, &handle.job_id).await;

    let err = result.unwrap_err();
    assert_matches!(err, JobError::JobFailed(ref message) if message == "boom");
    assert_eq!(err.to_string(), "job failed: boom");
}

#[rstest]
#[tokio::test]
async fn panicking_work_fails_job(account: AccountId, test_jobs: TestJobs) {
    let work: JobWork = Box::new(|_| async { panic!("work exploded") }.boxed());
    let handle = test_jobs
        .service
        .execute_within_job(account, None, "panics".to_string(), work, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Failed);
    let job = test_jobs.service.get_job(&account, &handle.job_id).await.unwrap();
    assert!(job.last_log().unwrap().message.starts_with("job work panicked or was aborted"));
}

/// Cancellation leaves the job pending with a "context close" entry.
#[rstest]
#[tokio::test]
async fn cancellation_keeps_job_pending(account: AccountId, test_jobs: TestJobs) {
    let cancellation = CancellationToken::new();
    let handle = test_jobs
        .service
        .execute_within_job(account, None, "long running".to_string(), never_finish(), cancellation.clone())
        .await
        .unwrap();

    cancellation.cancel();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Pending);
    let job = test_jobs.service.get_job(&account, &handle.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    let log = job.last_log().unwrap();
    assert_eq!(log.action, "context closed");
    assert!(log.message.contains("context close"));
    assert!(log.message.contains(&handle.job_id.to_string()));
}

#[rstest]
#[tokio::test]
async fn work_observes_cancellation_token(account: AccountId, test_jobs: TestJobs) {
    let (observed_tx, observed_rx) = tokio::sync::oneshot::channel();
    let work: JobWork = Box::new(move |ctx| {
        async move {
            ctx.cancellation.cancelled().await;
            let _ = observed_tx.send(ctx.job_id);
            Ok(())
        }
        .boxed()
    });
    let cancellation = CancellationToken::new();
    let handle = test_jobs
        .service
        .execute_within_job(account, None, "observer".to_string(), work, cancellation.clone())
        .await
        .unwrap();

    cancellation.cancel();

    assert_eq!(observed_rx.await.unwrap(), handle.job_id);
}

/// Work on an existing job is not finalized or notified by the supervisor.
#[rstest]
#[tokio::test]
#[traced_test]
async fn notification_failure_is_only_logged(account: AccountId) {
    let mut notifier = MockNotificationSender::new();
    notifier.expect_send().times(1).returning(|_| Err(NotificationError::UnexpectedStatus { status: 502 }));
    let jobs = TestJobs::new(notifier);

    let handle = jobs
        .service
        .execute_within_job(account, None, "Mint NFT Job".to_string(), succeed(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Success);
    tokio::task::yield_now().await;
    assert!(jobs.service.get_job(&account, &handle.job_id).await.unwrap().is_successful());
    assert!(logs_contain("Failed to send job notification"));
}

#[rstest]
#[tokio::test]
async fn existing_job_is_left_to_the_caller(account: AccountId) {
    let mut notifier = MockNotificationSender::new();
    notifier.expect_send().times(0);
    let jobs = TestJobs::new(notifier);
    let existing = jobs.seed_job(account, JobStatus::Pending).await;

    let handle = jobs
        .service
        .execute_within_job(account, Some(existing), "resumed".to_string(), succeed(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.job_id, existing);
    assert_eq!(handle.done.await.unwrap(), JobStatus::Pending);

    let job = jobs.service.finalize_job(&account, &existing, JobStatus::Success, "resumed chain done").await.unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.last_log().unwrap().message, "resumed chain done");
}

#[rstest]
#[tokio::test]
async fn failing_work_on_existing_job_fails_it(account: AccountId, test_jobs: TestJobs) {
    let existing = test_jobs.seed_job(account, JobStatus::Pending).await;

    let handle = test_jobs
        .service
        .execute_within_job(
            account,
            Some(existing),
            "resumed".to_string(),
            fail("step gave up"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(handle.done.await.unwrap(), JobStatus::Failed);
}

#[rstest]
#[tokio::test]
async fn unknown_existing_id_creates_new_job(account: AccountId, test_jobs: TestJobs) {
    let unknown = JobId::new();

    let handle = test_jobs
        .service
        .execute_within_job(account, Some(unknown), "fresh".to_string(), succeed(), CancellationToken::new())
        .await
        .unwrap();

    assert_ne!(handle.job_id, unknown);
    assert_eq!(handle.done.await.unwrap(), JobStatus::Success);
}

#[rstest]
#[tokio::test]
async fn finalize_rejects_terminal_job(account: AccountId, test_jobs: TestJobs) {
    let done = test_jobs.seed_job(account, JobStatus::Success).await;

    let result = test_jobs.service.finalize_job(&account, &done, JobStatus::Failed, "too late").await;

    assert_matches!(
        result,
        Err(JobError::InvalidStatusTransition { from: JobStatus::Success, to: JobStatus::Failed, .. })
    );
}

#[rstest]
#[tokio::test]
async fn failed_updates_release_their_lock(account: AccountId, test_jobs: TestJobs) {
    let unknown = JobId::new();
    let missing = test_jobs.service.update_task_status(&account, &unknown, JobStatus::Pending, "step", "x").await;
    assert_matches!(missing, Err(JobError::JobNotFound { id }) if id == unknown);
    assert_eq!(test_jobs.service.tracked_locks(), 0);

    let done = test_jobs.seed_job(account, JobStatus::Success).await;
    let rejected = test_jobs.service.finalize_job(&account, &done, JobStatus::Failed, "too late").await;
    assert_matches!(rejected, Err(JobError::InvalidStatusTransition { .. }));
    assert_eq!(test_jobs.service.tracked_locks(), 0);
}

/// Recording the same task twice keeps one status entry and two log entries.
#[rstest]
#[tokio::test]
async fn task_status_updates_accumulate_logs(account: AccountId, test_jobs: TestJobs) {
    let id = test_jobs.seed_job(account, JobStatus::Pending).await;

    test_jobs
        .service
        .update_task_status(&account, &id, JobStatus::Pending, "wait_mint_nft", "not mined")
        .await
        .unwrap();
    test_jobs.service.update_task_status(&account, &id, JobStatus::Success, "wait_mint_nft", "mined").await.unwrap();

    let job = test_jobs.service.get_job(&account, &id).await.unwrap();
    assert_eq!(job.task_status.len(), 1);
    assert_eq!(job.task_status["wait_mint_nft"], JobStatus::Success);
    assert_eq!(job.logs.len(), 2);
    assert_eq!(job.logs[0].message, "not mined");
    assert_eq!(job.logs[1].action, "wait_mint_nft");
}

#[rstest]
#[tokio::test]
async fn job_values_are_overwritten_by_key(account: AccountId, test_jobs: TestJobs) {
    let id = test_jobs.seed_job(account, JobStatus::Pending).await;

    test_jobs.service.update_job_with_value(&account, &id, "result", vec![1]).await.unwrap();
    test_jobs.service.update_job_with_value(&account, &id, "result", vec![2]).await.unwrap();

    let job = test_jobs.service.get_job(&account, &id).await.unwrap();
    assert_eq!(job.values.len(), 1);
    assert_eq!(job.values["result"].value, vec![2]);
}

/// Concurrent writers on one job never lose each other's updates.
#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_task_updates_are_not_lost(account: AccountId, test_jobs: TestJobs) {
    let id = test_jobs.seed_job(account, JobStatus::Pending).await;
    let manager: Arc<dyn JobManager> = test_jobs.manager();

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.update_task_status(&account, &id, JobStatus::Success, &format!("task_{i}"), "done").await
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let job = manager.get_job(&account, &id).await.unwrap();
    assert_eq!(job.task_status.len(), 16);
    assert_eq!(job.logs.len(), 16);
    assert_eq!(job.version, 16);
}

#[rstest]
#[tokio::test]
async fn missing_job_is_reported(account: AccountId, test_jobs: TestJobs) {
    let id = JobId::new();

    assert_matches!(
        test_jobs.service.get_job(&account, &id).await,
        Err(JobError::JobNotFound { id: missing }) if missing == id
    );
    assert_matches!(
        test_jobs.service.update_task_status(&account, &id, JobStatus::Success, "task", "msg").await,
        Err(JobError::JobNotFound { .. })
    );
}

#[rstest]
#[tokio::test]
async fn list_jobs_returns_created_jobs(account: AccountId) {
    let jobs = TestJobs::new(silent_notifier());
    let first = jobs.seed_job(account, JobStatus::Pending).await;
    let second = jobs.seed_job(account, JobStatus::Success).await;

    let mut listed: Vec<_> = jobs.service.list_jobs(&account).await.unwrap().into_iter().map(|job| job.id).collect();
    listed.sort();
    let mut expected = vec![first, second];
    expected.sort();

    assert_eq!(listed, expected);
}

#[rstest]
#[tokio::test]
async fn default_task_timeout_is_configured(test_jobs: TestJobs) {
    assert_eq!(test_jobs.service.default_task_timeout(), Duration::from_secs(5));
}
