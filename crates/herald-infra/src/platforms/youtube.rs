//! YouTube Data API adapter using the resumable upload protocol.

use async_trait::async_trait;
use reqwest::header::LOCATION;
use serde::Deserialize;

use herald_core::domain::Platform;
use herald_core::ports::{PlatformAdapter, PublishError, PublishRequest};

use super::{PlatformHttp, is_video_url};

const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
}

pub struct YoutubeAdapter {
    http: PlatformHttp,
    base_url: String,
}

impl YoutubeAdapter {
    pub fn new(http: PlatformHttp, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Explicit title option, else the first line of the content.
    fn title(request: &PublishRequest<'_>) -> String {
        let title = request
            .option("title")
            .or_else(|| request.content.lines().find(|l| !l.trim().is_empty()))
            .unwrap_or("Untitled");
        title.trim().chars().take(MAX_TITLE_CHARS).collect()
    }
}

#[async_trait]
impl PlatformAdapter for YoutubeAdapter {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, PublishError> {
        self.http
            .token_accepted(
                self.http
                    .client()
                    .get(format!("{}/youtube/v3/channels", self.base_url))
                    .query(&[("part", "id"), ("mine", "true")])
                    .bearer_auth(access_token),
            )
            .await
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        let video_url = request
            .media_urls
            .iter()
            .find(|url| is_video_url(url))
            .ok_or_else(|| PublishError::Validation("YouTube posts require a video".into()))?;

        let video = self.http.fetch_media(video_url).await?;

        let metadata = serde_json::json!({
            "snippet": {
                "title": Self::title(&request),
                "description": request.content,
            },
            "status": {
                "privacyStatus": request.option("privacyStatus").unwrap_or("public"),
            },
        });

        let session = self
            .http
            .send(
                self.http
                    .client()
                    .post(format!("{}/upload/youtube/v3/videos", self.base_url))
                    .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .bearer_auth(request.access_token)
                    .header("X-Upload-Content-Type", video.content_type.as_str())
                    .header("X-Upload-Content-Length", video.bytes.len())
                    .json(&metadata),
            )
            .await?;

        let upload_url = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PublishError::Upstream {
                status: session.status().as_u16(),
                message: "resumable session did not return an upload URL".into(),
            })?;

        let uploaded: Video = self
            .http
            .send_json(
                self.http
                    .client()
                    .put(upload_url)
                    .bearer_auth(request.access_token)
                    .header(reqwest::header::CONTENT_TYPE, video.content_type)
                    .body(video.bytes),
            )
            .await?;

        Ok(uploaded.id)
    }
}
