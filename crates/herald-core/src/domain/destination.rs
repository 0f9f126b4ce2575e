use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Per-destination publish status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationStatus {
    Pending,
    Success,
    Failed,
}

impl DestinationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationStatus::Pending => "pending",
            DestinationStatus::Success => "success",
            DestinationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DestinationStatus::Pending)
    }
}

impl fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DestinationStatus::Pending),
            "success" => Ok(DestinationStatus::Success),
            "failed" => Ok(DestinationStatus::Failed),
            other => Err(DomainError::Validation(format!(
                "unknown destination status '{other}'"
            ))),
        }
    }
}

/// One (post, connected account) pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDestination {
    pub id: Uuid,
    pub post_id: Uuid,
    pub account_id: Uuid,
    pub status: DestinationStatus,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PostDestination {
    pub fn new(post_id: Uuid, account_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            account_id,
            status: DestinationStatus::Pending,
            platform_post_id: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }
}

/// A state change the dispatcher applies to a destination after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationUpdate {
    pub destination_id: Uuid,
    pub status: DestinationStatus,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
}

impl DestinationUpdate {
    pub fn success(destination_id: Uuid, platform_post_id: impl Into<String>) -> Self {
        Self {
            destination_id,
            status: DestinationStatus::Success,
            platform_post_id: Some(platform_post_id.into()),
            error_message: None,
        }
    }

    /// Attempt failed but another one is scheduled.
    pub fn retrying(destination_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            destination_id,
            status: DestinationStatus::Pending,
            platform_post_id: None,
            error_message: Some(error.into()),
        }
    }

    pub fn failed(destination_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            destination_id,
            status: DestinationStatus::Failed,
            platform_post_id: None,
            error_message: Some(error.into()),
        }
    }
}
