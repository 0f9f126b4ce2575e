//! Platform adapter port.
//!
//! One adapter per platform, selected through a static registry keyed by
//! [`Platform`]. Adapters perform exactly one publish attempt per call and
//! report failures through the typed [`PublishError`] taxonomy; retrying is
//! the dispatcher's job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Platform;

/// Semantic category of a publish failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials are invalid or expired.
    Auth,
    PermissionDenied,
    /// The platform rejected the payload (format, size, missing media).
    Validation,
    RateLimited,
    /// Connection reset, DNS failure and similar.
    Network,
    /// The platform answered with a 5xx.
    Upstream,
    Timeout,
}

/// Error returned by a platform adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    #[error("Invalid or expired credentials: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Payload rejected: {0}")]
    Validation(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl PublishError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PublishError::Auth(_) => ErrorCategory::Auth,
            PublishError::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            PublishError::Validation(_) => ErrorCategory::Validation,
            PublishError::RateLimited { .. } => ErrorCategory::RateLimited,
            PublishError::Network(_) => ErrorCategory::Network,
            PublishError::Upstream { .. } => ErrorCategory::Upstream,
            PublishError::Timeout(_) => ErrorCategory::Timeout,
        }
    }

    /// Short machine-readable code stored on the publish log.
    pub fn code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Auth => "auth_error",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::Validation => "validation_error",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::Network => "network_error",
            ErrorCategory::Upstream => "upstream_error",
            ErrorCategory::Timeout => "timeout",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PublishError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Everything an adapter needs for one publish call.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    /// Content already formatted for the platform.
    pub content: &'a str,
    pub media_urls: &'a [String],
    /// Decrypted access token.
    pub access_token: &'a str,
    pub platform_account_id: &'a str,
    /// Account metadata (page id, IG user id, author URN...).
    pub account_metadata: &'a serde_json::Value,
    /// Post-level overrides for this platform.
    pub options: &'a serde_json::Value,
}

impl PublishRequest<'_> {
    /// Look up a string option, preferring post overrides over account metadata.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(|v| v.as_str())
            .or_else(|| self.account_metadata.get(key).and_then(|v| v.as_str()))
    }
}

/// A platform client capable of publishing one post.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether the token is accepted by the platform.
    async fn validate_token(&self, access_token: &str) -> Result<bool, PublishError>;

    /// Publish and return the platform-assigned post id.
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError>;
}

/// Static dispatch table from platform to adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the platform it reports.
    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.adapters.keys().copied().collect();
        platforms.sort_by_key(|p| p.as_str());
        platforms
    }
}
