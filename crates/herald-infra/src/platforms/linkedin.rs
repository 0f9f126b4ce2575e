//! LinkedIn UGC posts adapter.

use async_trait::async_trait;
use serde::Deserialize;

use herald_core::domain::Platform;
use herald_core::ports::{PlatformAdapter, PublishError, PublishRequest};

use super::{PlatformHttp, decode_json};

#[derive(Debug, Deserialize)]
struct UgcCreated {
    id: Option<String>,
}

pub struct LinkedinAdapter {
    http: PlatformHttp,
    base_url: String,
}

impl LinkedinAdapter {
    pub fn new(http: PlatformHttp, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn share_body(author: &str, request: &PublishRequest<'_>) -> serde_json::Value {
        let media: Vec<_> = request
            .media_urls
            .iter()
            .map(|url| serde_json::json!({ "status": "READY", "originalUrl": url }))
            .collect();
        let category = if media.is_empty() { "NONE" } else { "ARTICLE" };
        let visibility = request.option("visibility").unwrap_or("PUBLIC");

        let mut share = serde_json::json!({
            "shareCommentary": { "text": request.content },
            "shareMediaCategory": category,
        });
        if !media.is_empty() {
            share["media"] = serde_json::Value::Array(media);
        }

        serde_json::json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": visibility },
        })
    }
}

#[async_trait]
impl PlatformAdapter for LinkedinAdapter {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, PublishError> {
        self.http
            .token_accepted(
                self.http
                    .client()
                    .get(format!("{}/v2/userinfo", self.base_url))
                    .bearer_auth(access_token),
            )
            .await
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        let author = match request.option("authorUrn") {
            Some(urn) => urn.to_string(),
            None => format!("urn:li:person:{}", request.platform_account_id),
        };

        let response = self
            .http
            .send(
                self.http
                    .client()
                    .post(format!("{}/v2/ugcPosts", self.base_url))
                    .bearer_auth(request.access_token)
                    .header("X-Restli-Protocol-Version", "2.0.0")
                    .json(&Self::share_body(&author, &request)),
            )
            .await?;

        if let Some(id) = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
        {
            return Ok(id.to_string());
        }

        let created: UgcCreated = decode_json(response).await?;
        created.id.ok_or_else(|| PublishError::Upstream {
            status: 201,
            message: "LinkedIn response did not include a post id".into(),
        })
    }
}
