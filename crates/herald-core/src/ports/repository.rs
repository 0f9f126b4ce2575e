use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    DestinationStatus, DestinationUpdate, PostDestination, PostStatus, PublishLogEntry,
    ScheduledPost, SocialAccount,
};
use crate::error::RepoError;

/// Read/write access to posts, destinations and the publish log.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Find a post; `None` once it has been deleted.
    async fn get_post(&self, id: Uuid) -> Result<Option<ScheduledPost>, RepoError>;

    async fn get_destination(&self, id: Uuid) -> Result<Option<PostDestination>, RepoError>;

    async fn list_destinations(&self, post_id: Uuid) -> Result<Vec<PostDestination>, RepoError>;

    /// Apply a destination update and append its log entry atomically.
    ///
    /// Returns the statuses of all of the post's destinations as seen right
    /// after the update, so callers can aggregate without a second read.
    async fn record_outcome(
        &self,
        update: DestinationUpdate,
        entry: PublishLogEntry,
    ) -> Result<Vec<DestinationStatus>, RepoError>;

    async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), RepoError>;

    async fn list_logs(&self, post_id: Uuid) -> Result<Vec<PublishLogEntry>, RepoError>;
}

/// Connected social accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: Uuid) -> Result<Option<SocialAccount>, RepoError>;

    /// Mark the account inactive. Idempotent; returns whether it was active.
    async fn deactivate_account(&self, id: Uuid) -> Result<bool, RepoError>;
}
