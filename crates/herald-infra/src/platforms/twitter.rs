//! X (Twitter) API v2 adapter.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use herald_core::domain::Platform;
use herald_core::ports::{PlatformAdapter, PublishError, PublishRequest};

use super::{PlatformHttp, is_video_url};

/// X accepts at most four attachments per post.
const MAX_MEDIA: usize = 4;

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct IdData {
    id: String,
}

pub struct TwitterAdapter {
    http: PlatformHttp,
    base_url: String,
}

impl TwitterAdapter {
    pub fn new(http: PlatformHttp, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn upload_media(&self, access_token: &str, url: &str) -> Result<String, PublishError> {
        let media = self.http.fetch_media(url).await?;
        let category = if is_video_url(url) || media.content_type.starts_with("video/") {
            "tweet_video"
        } else {
            "tweet_image"
        };

        let part = Part::bytes(media.bytes)
            .file_name("media")
            .mime_str(&media.content_type)
            .map_err(|e| PublishError::Validation(format!("bad media type: {e}")))?;
        let form = Form::new()
            .text("media_category", category)
            .part("media", part);

        let uploaded: DataEnvelope<IdData> = self
            .http
            .send_json(
                self.http
                    .client()
                    .post(format!("{}/2/media/upload", self.base_url))
                    .bearer_auth(access_token)
                    .multipart(form),
            )
            .await?;

        tracing::debug!(media_id = %uploaded.data.id, category, "Uploaded media to X");
        Ok(uploaded.data.id)
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, PublishError> {
        self.http
            .token_accepted(
                self.http
                    .client()
                    .get(format!("{}/2/users/me", self.base_url))
                    .bearer_auth(access_token),
            )
            .await
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        if request.content.trim().is_empty() && request.media_urls.is_empty() {
            return Err(PublishError::Validation("post has no text or media".into()));
        }

        let mut media_ids = Vec::new();
        for url in request.media_urls.iter().take(MAX_MEDIA) {
            media_ids.push(self.upload_media(request.access_token, url).await?);
        }

        let mut body = serde_json::json!({ "text": request.content });
        if !media_ids.is_empty() {
            body["media"] = serde_json::json!({ "media_ids": media_ids });
        }
        if let Some(reply_to) = request.option("replyToTweetId") {
            body["reply"] = serde_json::json!({ "in_reply_to_tweet_id": reply_to });
        }

        let created: DataEnvelope<IdData> = self
            .http
            .send_json(
                self.http
                    .client()
                    .post(format!("{}/2/tweets", self.base_url))
                    .bearer_auth(request.access_token)
                    .json(&body),
            )
            .await?;

        Ok(created.data.id)
    }
}
