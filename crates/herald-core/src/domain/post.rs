use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Platform;
use crate::error::DomainError;

/// Lifecycle status of a scheduled post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    /// Whether the post may still be edited by its owner.
    pub fn is_editable(&self) -> bool {
        matches!(self, PostStatus::Draft | PostStatus::Scheduled)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(DomainError::Validation(format!("unknown post status '{other}'"))),
        }
    }
}

/// A unit of content a user wants published to one or more platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: Option<String>,
    pub media_urls: Vec<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    /// Per-platform overrides keyed by platform name, e.g.
    /// `{"youtube": {"title": "..."}}`.
    pub platform_options: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPost {
    /// Create a new scheduled post. Content or at least one media URL is required.
    pub fn new(
        user_id: Uuid,
        content: Option<String>,
        media_urls: Vec<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let content = content.filter(|c| !c.trim().is_empty());
        if content.is_none() && media_urls.is_empty() {
            return Err(DomainError::Validation(
                "a post needs content or at least one media URL".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            content,
            media_urls,
            scheduled_at,
            status: PostStatus::Scheduled,
            platform_options: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_platform_options(mut self, options: serde_json::Value) -> Self {
        self.platform_options = options;
        self
    }

    /// Raw text content, empty when the post is media-only.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Overrides for a single platform, or `Null` when none are set.
    pub fn options_for(&self, platform: Platform) -> serde_json::Value {
        self.platform_options
            .get(platform.as_str())
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}
