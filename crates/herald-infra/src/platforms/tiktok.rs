//! TikTok Content Posting API adapter. Videos are pulled by TikTok from the
//! media URL, so nothing is uploaded from here.

use async_trait::async_trait;
use serde::Deserialize;

use herald_core::domain::Platform;
use herald_core::ports::{PlatformAdapter, PublishError, PublishRequest};

use super::{PlatformHttp, is_video_url};

#[derive(Debug, Deserialize)]
struct InitResponse {
    data: Option<InitData>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    message: String,
}

pub struct TiktokAdapter {
    http: PlatformHttp,
    base_url: String,
}

impl TiktokAdapter {
    pub fn new(http: PlatformHttp, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for TiktokAdapter {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, PublishError> {
        self.http
            .token_accepted(
                self.http
                    .client()
                    .get(format!("{}/v2/user/info/", self.base_url))
                    .query(&[("fields", "open_id")])
                    .bearer_auth(access_token),
            )
            .await
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        let video_url = request
            .media_urls
            .iter()
            .find(|url| is_video_url(url))
            .ok_or_else(|| PublishError::Validation("TikTok posts require a video".into()))?;

        let body = serde_json::json!({
            "post_info": {
                "title": request.content,
                "privacy_level": request.option("privacyLevel").unwrap_or("PUBLIC_TO_EVERYONE"),
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": video_url,
            },
        });

        let init: InitResponse = self
            .http
            .send_json(
                self.http
                    .client()
                    .post(format!("{}/v2/post/publish/video/init/", self.base_url))
                    .bearer_auth(request.access_token)
                    .json(&body),
            )
            .await?;

        // TikTok reports some rejections with a 200 and an error code.
        if let Some(error) = init.error.filter(|e| e.code != "ok") {
            return Err(match error.code.as_str() {
                "access_token_invalid" => PublishError::Auth(error.message),
                "scope_not_authorized" => PublishError::PermissionDenied(error.message),
                "rate_limit_exceeded" => PublishError::RateLimited {
                    message: error.message,
                    retry_after: None,
                },
                _ => PublishError::Validation(format!("{}: {}", error.code, error.message)),
            });
        }

        init.data
            .map(|d| d.publish_id)
            .ok_or_else(|| PublishError::Upstream {
                status: 200,
                message: "TikTok response did not include a publish id".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::test_support::{empty, http};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn video() -> Vec<String> {
        vec!["https://cdn.example.com/dance.mp4".to_string()]
    }

    #[tokio::test]
    async fn test_pull_from_url_init() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/video/init/"))
            .and(body_partial_json(serde_json::json!({
                "source_info": {"source": "PULL_FROM_URL", "video_url": "https://cdn.example.com/dance.mp4"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"publish_id": "v_pub_url~v2.123"},
                "error": {"code": "ok", "message": ""}
            })))
            .mount(&server)
            .await;

        let adapter = TiktokAdapter::new(http(), &server.uri());
        let media = video();
        let meta = empty();
        let id = adapter
            .publish(PublishRequest {
                content: "dance",
                media_urls: &media,
                access_token: "tt",
                platform_account_id: "open-1",
                account_metadata: &meta,
                options: &meta,
            })
            .await
            .unwrap();
        assert_eq!(id, "v_pub_url~v2.123");
    }

    #[tokio::test]
    async fn test_error_code_in_ok_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/video/init/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"code": "access_token_invalid", "message": "The access token is invalid"}
            })))
            .mount(&server)
            .await;

        let adapter = TiktokAdapter::new(http(), &server.uri());
        let media = video();
        let meta = empty();
        let err = adapter
            .publish(PublishRequest {
                content: "dance",
                media_urls: &media,
                access_token: "tt",
                platform_account_id: "open-1",
                account_metadata: &meta,
                options: &meta,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Auth(_)));
    }
}
