use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Platform;

/// A connected third-party account. Owned by the OAuth flows; the pipeline
/// only reads it, apart from deactivating it on unrecoverable auth failure.
#[derive(Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    /// `ivHex:authTagHex:cipherHex`, or plaintext for legacy rows.
    pub encrypted_access_token: String,
    pub platform_account_id: String,
    /// Platform specifics such as `pageId`, `igUserId` or `authorUrn`.
    pub metadata: serde_json::Value,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl SocialAccount {
    pub fn new(
        user_id: Uuid,
        platform: Platform,
        encrypted_access_token: impl Into<String>,
        platform_account_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            platform,
            encrypted_access_token: encrypted_access_token.into(),
            platform_account_id: platform_account_id.into(),
            metadata: serde_json::Value::Object(Default::default()),
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// String metadata field, if present.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

// Keeps the stored token out of logs.
impl std::fmt::Debug for SocialAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("platform", &self.platform)
            .field("platform_account_id", &self.platform_account_id)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}
