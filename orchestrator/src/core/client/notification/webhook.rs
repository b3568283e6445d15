use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{NotificationError, NotificationMessage, NotificationSender, NotificationStatus};

/// POSTs notifications as JSON to a configured endpoint.
pub struct WebhookSender {
    client: Client,
    url: Option<Url>,
}

impl WebhookSender {
    pub fn new(url: Option<Url>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, message: NotificationMessage) -> Result<NotificationStatus, NotificationError> {
        let Some(url) = &self.url else {
            debug!(job_id = %message.document_id, "Webhook not configured, skipping notification");
            return Ok(NotificationStatus::Disabled);
        };

        let response = self.client.post(url.clone()).json(&message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::UnexpectedStatus { status: status.as_u16() });
        }

        debug!(job_id = %message.document_id, %url, "Notification sent");
        Ok(NotificationStatus::Sent)
    }
}
