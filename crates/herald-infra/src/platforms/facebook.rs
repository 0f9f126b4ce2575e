//! Facebook Pages adapter (Graph API).

use async_trait::async_trait;
use serde::Deserialize;

use herald_core::domain::Platform;
use herald_core::ports::{PlatformAdapter, PublishError, PublishRequest};

use super::{PlatformHttp, is_video_url};

#[derive(Debug, Deserialize)]
struct GraphCreated {
    id: Option<String>,
    post_id: Option<String>,
}

pub struct FacebookAdapter {
    http: PlatformHttp,
    graph_url: String,
}

impl FacebookAdapter {
    pub fn new(http: PlatformHttp, graph_url: &str) -> Self {
        Self {
            http,
            graph_url: graph_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
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
        let page_id = request
            .option("pageId")
            .unwrap_or(request.platform_account_id);

        let (edge, body) = match request.media_urls.first() {
            Some(url) if is_video_url(url) => (
                "videos",
                serde_json::json!({ "file_url": url, "description": request.content }),
            ),
            Some(url) => (
                "photos",
                serde_json::json!({ "url": url, "caption": request.content }),
            ),
            None => {
                if request.content.trim().is_empty() {
                    return Err(PublishError::Validation("post has no text or media".into()));
                }
                let mut body = serde_json::json!({ "message": request.content });
                if let Some(link) = request.option("link") {
                    body["link"] = serde_json::json!(link);
                }
                ("feed", body)
            }
        };

        let created: GraphCreated = self
            .http
            .send_json(
                self.http
                    .client()
                    .post(format!("{}/{page_id}/{edge}", self.graph_url))
                    .query(&[("access_token", request.access_token)])
                    .json(&body),
            )
            .await?;

        // Photo posts report the feed story as post_id; the bare id is the photo.
        created
            .post_id
            .or(created.id)
            .ok_or_else(|| PublishError::Upstream {
                status: 200,
                message: "Graph API response did not include a post id".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::test_support::{empty, http};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_text_post_goes_to_page_feed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page-1/feed"))
            .and(query_param("access_token", "page-token"))
            .and(body_partial_json(serde_json::json!({"message": "Launch day"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "page-1_999"
            })))
            .mount(&server)
            .await;

        let adapter = FacebookAdapter::new(http(), &server.uri());
        let meta = serde_json::json!({"pageId": "page-1"});
        let options = empty();
        let id = adapter
            .publish(PublishRequest {
                content: "Launch day",
                media_urls: &[],
                access_token: "page-token",
                platform_account_id: "user-1",
                account_metadata: &meta,
                options: &options,
            })
            .await
            .unwrap();
        assert_eq!(id, "page-1_999");
    }

    #[tokio::test]
    async fn test_photo_post_prefers_post_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page-1/photos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "photo-5", "post_id": "page-1_777"
            })))
            .mount(&server)
            .await;

        let adapter = FacebookAdapter::new(http(), &server.uri());
        let media = vec!["https://cdn.example.com/a.jpg".to_string()];
        let meta = empty();
        let id = adapter
            .publish(PublishRequest {
                content: "caption",
                media_urls: &media,
                access_token: "page-token",
                platform_account_id: "page-1",
                account_metadata: &meta,
                options: &meta,
            })
            .await
            .unwrap();
        assert_eq!(id, "page-1_777");
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page-1/feed"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"message": "An unexpected error has occurred", "code": 2}
            })))
            .mount(&server)
            .await;

        let adapter = FacebookAdapter::new(http(), &server.uri());
        let meta = empty();
        let err = adapter
            .publish(PublishRequest {
                content: "text",
                media_urls: &[],
                access_token: "t",
                platform_account_id: "page-1",
                account_metadata: &meta,
                options: &meta,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Upstream { status: 500, .. }));
    }
}
