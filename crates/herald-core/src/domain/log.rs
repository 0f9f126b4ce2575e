use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Platform;

/// Outcome recorded for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

/// Immutable audit record, one per dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishLogEntry {
    pub id: Uuid,
    pub post_id: Uuid,
    pub destination_id: Uuid,
    /// Unknown when the connected account could not be loaded.
    pub platform: Option<Platform>,
    pub status: AttemptStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl PublishLogEntry {
    pub fn success(post_id: Uuid, destination_id: Uuid, platform: Platform, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            destination_id,
            platform: Some(platform),
            status: AttemptStatus::Success,
            error_code: None,
            error_message: None,
            attempt,
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        post_id: Uuid,
        destination_id: Uuid,
        platform: Option<Platform>,
        attempt: u32,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            destination_id,
            platform,
            status: AttemptStatus::Failed,
            error_code: Some(code.to_string()),
            error_message: Some(message.into()),
            attempt,
            created_at: Utc::now(),
        }
    }
}
