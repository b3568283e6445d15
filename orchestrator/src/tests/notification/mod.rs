use std::time::Duration;

use assert_matches::assert_matches;
use httpmock::prelude::*;
use rstest::*;
use serde_json::json;
use url::Url;

use crate::core::client::notification::{
    NotificationError, NotificationMessage, NotificationSender, NotificationStatus, WebhookSender, JOB_DOCUMENT_TYPE,
};
use crate::tests::common::account;
use crate::types::jobs::{JobId, JobStatus};
use crate::types::AccountId;

fn message(account: AccountId, job_id: JobId) -> NotificationMessage {
    NotificationMessage::job_completed(account, job_id, JobStatus::Success, "task completed".to_string())
}

#[rstest]
#[tokio::test]
async fn webhook_posts_job_completion(account: AccountId) {
    let server = MockServer::start_async().await;
    let job_id = JobId::new();
    let hook = server
        .mock_async(|when, then| {
            when.method(POST).path("/jobs").json_body_partial(
                json!({
                    "event_type": "JobCompleted",
                    "document_type": JOB_DOCUMENT_TYPE,
                    "document_id": job_id.to_string(),
                    "status": "success",
                    "message": "task completed",
                })
                .to_string(),
            );
            then.status(200);
        })
        .await;
    let url = Url::parse(&server.url("/jobs")).unwrap();
    let sender = WebhookSender::new(Some(url), Duration::from_secs(5)).unwrap();

    let status = sender.send(message(account, job_id)).await.unwrap();

    assert_eq!(status, NotificationStatus::Sent);
    hook.assert_async().await;
}

#[rstest]
#[tokio::test]
async fn webhook_rejection_is_reported(account: AccountId) {
    let server = MockServer::start_async().await;
    let hook = server
        .mock_async(|when, then| {
            when.method(POST).path("/jobs");
            then.status(500);
        })
        .await;
    let url = Url::parse(&server.url("/jobs")).unwrap();
    let sender = WebhookSender::new(Some(url), Duration::from_secs(5)).unwrap();

    let result = sender.send(message(account, JobId::new())).await;

    assert_matches!(result, Err(NotificationError::UnexpectedStatus { status: 500 }));
    hook.assert_async().await;
}

#[rstest]
#[tokio::test]
async fn webhook_without_url_is_disabled(account: AccountId) {
    let sender = WebhookSender::new(None, Duration::from_secs(5)).unwrap();

    let status = sender.send(message(account, JobId::new())).await.unwrap();

    assert_eq!(status, NotificationStatus::Disabled);
}
