//! HTTP adapters for the supported social platforms.
//!
//! Every adapter shares [`PlatformHttp`], which owns the reqwest client and
//! maps transport failures and non-2xx statuses onto [`PublishError`].

mod facebook;
mod instagram;
mod linkedin;
mod tiktok;
mod twitter;
mod youtube;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use herald_core::ports::{AdapterRegistry, PublishError};

pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use linkedin::LinkedinAdapter;
pub use tiktok::TiktokAdapter;
pub use twitter::TwitterAdapter;
pub use youtube::YoutubeAdapter;

/// Error bodies are cut to this many characters before they reach logs.
const MAX_ERROR_BODY: usize = 500;

/// Default cap on a downloaded media file.
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 512 * 1024 * 1024;

/// Base URLs for each platform API. Overridable for tests and sandboxes.
#[derive(Debug, Clone)]
pub struct PlatformEndpoints {
    pub twitter: String,
    pub facebook_graph: String,
    pub linkedin: String,
    pub google: String,
    pub tiktok: String,
}

impl Default for PlatformEndpoints {
    fn default() -> Self {
        Self {
            twitter: "https://api.x.com".to_string(),
            facebook_graph: "https://graph.facebook.com/v19.0".to_string(),
            linkedin: "https://api.linkedin.com".to_string(),
            google: "https://www.googleapis.com".to_string(),
            tiktok: "https://open.tiktokapis.com".to_string(),
        }
    }
}

impl PlatformEndpoints {
    /// Every platform served from one base URL.
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            twitter: base.clone(),
            facebook_graph: base.clone(),
            linkedin: base.clone(),
            google: base.clone(),
            tiktok: base,
        }
    }
}

/// Registry with an adapter for every supported platform.
///
/// YouTube moves whole videos and runs on `media_http`. Instagram keeps short
/// requests but sizes its processing poll to `media_http`'s timeout.
pub fn default_registry(
    http: PlatformHttp,
    media_http: PlatformHttp,
    endpoints: &PlatformEndpoints,
) -> AdapterRegistry {
    let instagram = InstagramAdapter::new(http.clone(), &endpoints.facebook_graph)
        .with_poll_budget(media_http.timeout());

    AdapterRegistry::new()
        .with(Arc::new(TwitterAdapter::new(http.clone(), &endpoints.twitter)))
        .with(Arc::new(FacebookAdapter::new(http.clone(), &endpoints.facebook_graph)))
        .with(Arc::new(instagram))
        .with(Arc::new(LinkedinAdapter::new(http.clone(), &endpoints.linkedin)))
        .with(Arc::new(YoutubeAdapter::new(media_http, &endpoints.google)))
        .with(Arc::new(TiktokAdapter::new(http, &endpoints.tiktok)))
}

/// Downloaded media ready for upload.
#[derive(Debug, Clone)]
pub(crate) struct Media {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Shared HTTP plumbing for adapters.
#[derive(Clone)]
pub struct PlatformHttp {
    client: Client,
    timeout: Duration,
    max_media_bytes: u64,
}

impl PlatformHttp {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("herald-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
        })
    }

    /// Refuse media files larger than `max` bytes.
    pub fn with_max_media_bytes(mut self, max: u64) -> Self {
        self.max_media_bytes = max;
        self
    }

    /// Per-request timeout of the underlying client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request and turn any non-2xx response into a classified error.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, PublishError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(classify_response(response).await)
    }

    /// Send and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PublishError> {
        let response = self.send(request).await?;
        decode_json(response).await
    }

    /// Call an identity endpoint: 2xx is valid, 401/403 is not.
    pub(crate) async fn token_accepted(&self, request: RequestBuilder) -> Result<bool, PublishError> {
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(PublishError::Auth(_) | PublishError::PermissionDenied(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Download a media file, refusing anything over the size cap.
    pub(crate) async fn fetch_media(&self, url: &str) -> Result<Media, PublishError> {
        let mut response = self
            .send(self.client.get(url))
            .await
            .map_err(|e| match e {
                // A media URL we cannot fetch is a payload problem, not the platform's.
                PublishError::Auth(m) | PublishError::PermissionDenied(m) => {
                    PublishError::Validation(format!("media {url} not accessible: {m}"))
                }
                PublishError::Validation(m) => {
                    PublishError::Validation(format!("media {url} not found: {m}"))
                }
                other => other,
            })?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(url).to_string());

        let too_large = || {
            PublishError::Validation(format!(
                "media {url} exceeds the {} byte limit",
                self.max_media_bytes
            ))
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_media_bytes)
        {
            return Err(too_large());
        }

        // Content-Length may be absent or wrong, so count while streaming.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e))? {
            if (bytes.len() + chunk.len()) as u64 > self.max_media_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(Media {
            bytes,
            content_type,
        })
    }

    pub(crate) fn transport_error(&self, error: reqwest::Error) -> PublishError {
        if error.is_timeout() {
            PublishError::Timeout(self.timeout)
        } else if error.is_decode() {
            PublishError::Upstream {
                status: error.status().map(|s| s.as_u16()).unwrap_or(502),
                message: error.to_string(),
            }
        } else {
            PublishError::Network(error.to_string())
        }
    }
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, PublishError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| PublishError::Network(e.to_string()))?;

    serde_json::from_str(&body).map_err(|e| PublishError::Upstream {
        status,
        message: format!("unexpected response body: {e}"),
    })
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) async fn classify_response(response: Response) -> PublishError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, &body)
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> PublishError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });

    match status.as_u16() {
        401 => PublishError::Auth(message),
        403 => PublishError::PermissionDenied(message),
        429 => PublishError::RateLimited {
            message,
            retry_after,
        },
        400 | 404 | 413 | 415 | 422 => PublishError::Validation(message),
        code if status.is_server_error() => PublishError::Upstream {
            status: code,
            message,
        },
        _ => PublishError::Validation(format!("unexpected status {}: {message}", status.as_u16())),
    }
}

/// Seconds form of `Retry-After`. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pull a human-readable message out of the usual platform error shapes.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            [
                "/error/message",
                "/error_description",
                "/detail",
                "/message",
                "/title",
                "/errors/0/message",
                "/error",
            ]
            .iter()
            .find_map(|pointer| json.pointer(pointer).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string());

    Some(message.chars().take(MAX_ERROR_BODY).collect())
}

/// Whether a media URL points at a video, judged by extension.
pub(crate) fn is_video_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    [".mp4", ".mov", ".m4v", ".webm"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

fn guess_content_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".mp4") || path.ends_with(".m4v") {
        "video/mp4"
    } else if path.ends_with(".mov") {
        "video/quicktime"
    } else if path.ends_with(".webm") {
        "video/webm"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn http() -> PlatformHttp {
        PlatformHttp::new(Duration::from_secs(5)).unwrap()
    }

    pub fn empty() -> serde_json::Value {
        serde_json::json!({})
    }
}
