//! Delivers notifications as JSON POSTs to a configured URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use herald_core::ports::{NotificationKind, Notifier, NotifyError};

#[derive(Debug, Clone)]
pub struct WebhookNotifierConfig {
    pub url: String,
    pub timeout: Duration,
}

impl WebhookNotifierConfig {
    /// `None` when `NOTIFY_WEBHOOK_URL` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("NOTIFY_WEBHOOK_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        Some(Self {
            url,
            timeout: Duration::from_secs(10),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    user_id: Uuid,
    #[serde(rename = "type")]
    kind: NotificationKind,
    payload: &'a serde_json::Value,
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: WebhookNotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self {
            client,
            url: config.url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn trigger(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookBody {
                user_id,
                kind,
                payload: &payload,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        tracing::debug!(user_id = %user_id, kind = %kind, "Notification delivered");
        Ok(())
    }
}
