//! Instagram Graph API adapter: create a media container, then publish it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use herald_core::domain::Platform;
use herald_core::ports::{PlatformAdapter, PublishError, PublishRequest};

use super::{PlatformHttp, is_video_url};

const MAX_CAROUSEL_ITEMS: usize = 10;

/// Pause between container status checks.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    status_code: Option<String>,
}

pub struct InstagramAdapter {
    http: PlatformHttp,
    graph_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl InstagramAdapter {
    pub fn new(http: PlatformHttp, graph_url: &str) -> Self {
        Self {
            http,
            graph_url: graph_url.trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
            max_polls: polls_within(Duration::from_secs(30), POLL_INTERVAL),
        }
    }

    /// Status polls a publish gets under `budget`; zero means video
    /// containers can never be waited for.
    pub fn polls_for_budget(budget: Duration) -> u32 {
        polls_within(budget, POLL_INTERVAL)
    }

    /// Size the processing poll so a whole publish fits in `budget`.
    pub fn with_poll_budget(mut self, budget: Duration) -> Self {
        self.max_polls = polls_within(budget, self.poll_interval);
        self
    }

    /// How often to check whether a video container finished processing.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn create_container(
        &self,
        ig_user_id: &str,
        access_token: &str,
        body: serde_json::Value,
    ) -> Result<String, PublishError> {
        let created: Created = self
            .http
            .send_json(
                self.http
                    .client()
                    .post(format!("{}/{ig_user_id}/media", self.graph_url))
                    .query(&[("access_token", access_token)])
                    .json(&body),
            )
            .await?;
        Ok(created.id)
    }

    fn media_body(url: &str, carousel_item: bool) -> serde_json::Value {
        let mut body = if is_video_url(url) {
            let media_type = if carousel_item { "VIDEO" } else { "REELS" };
            serde_json::json!({ "media_type": media_type, "video_url": url })
        } else {
            serde_json::json!({ "image_url": url })
        };
        if carousel_item {
            body["is_carousel_item"] = serde_json::json!(true);
        }
        body
    }

    /// Video containers are processed asynchronously and cannot be published
    /// before they report FINISHED.
    async fn wait_until_ready(&self, container_id: &str, access_token: &str) -> Result<(), PublishError> {
        for _ in 0..self.max_polls {
            let status: ContainerStatus = self
                .http
                .send_json(
                    self.http
                        .client()
                        .get(format!("{}/{container_id}", self.graph_url))
                        .query(&[("fields", "status_code"), ("access_token", access_token)]),
                )
                .await?;

            match status.status_code.as_deref() {
                Some("FINISHED") | None => return Ok(()),
                Some("ERROR") | Some("EXPIRED") => {
                    return Err(PublishError::Validation(format!(
                        "media container {container_id} failed processing"
                    )));
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(PublishError::Upstream {
            status: 202,
            message: format!("media container {container_id} still processing"),
        })
    }
}

/// Status polls that fit in half of `budget`; the other half covers the
/// container and publish calls.
fn polls_within(budget: Duration, interval: Duration) -> u32 {
    let polls = (budget / 2).as_millis() / interval.as_millis().max(1);
    u32::try_from(polls).unwrap_or(u32::MAX)
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, PublishError> {
        self.http
            .token_accepted(
                self.http
                    .client()
                    .get(format!("{}/me", self.graph_url))
                    .query(&[("fields", "id"), ("access_token", access_token)]),
            )
            .await
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        if request.media_urls.is_empty() {
            return Err(PublishError::Validation(
                "Instagram posts require at least one image or video".into(),
            ));
        }

        let ig_user_id = request
            .option("igUserId")
            .unwrap_or(request.platform_account_id);
        let token = request.access_token;

        let container_id = if let [url] = request.media_urls {
            let mut body = Self::media_body(url, false);
            body["caption"] = serde_json::json!(request.content);
            let id = self.create_container(ig_user_id, token, body).await?;
            if is_video_url(url) {
                self.wait_until_ready(&id, token).await?;
            }
            id
        } else {
            let mut children = Vec::new();
            for url in request.media_urls.iter().take(MAX_CAROUSEL_ITEMS) {
                let id = self
                    .create_container(ig_user_id, token, Self::media_body(url, true))
                    .await?;
                if is_video_url(url) {
                    self.wait_until_ready(&id, token).await?;
                }
                children.push(id);
            }
            let body = serde_json::json!({
                "media_type": "CAROUSEL",
                "children": children.join(","),
                "caption": request.content,
            });
            self.create_container(ig_user_id, token, body).await?
        };

        let published: Created = self
            .http
            .send_json(
                self.http
                    .client()
                    .post(format!("{}/{ig_user_id}/media_publish", self.graph_url))
                    .query(&[("access_token", token)])
                    .json(&serde_json::json!({ "creation_id": container_id })),
            )
            .await?;

        Ok(published.id)
    }
}
