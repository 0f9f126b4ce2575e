//! In-memory publishing store.
//!
//! Backs the pipeline when no database is configured and drives the
//! end-to-end tests. A single lock covers posts, destinations and logs so
//! `record_outcome` is atomic like its Postgres counterpart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_core::domain::{
    DestinationStatus, DestinationUpdate, PostDestination, PostStatus, PublishLogEntry,
    ScheduledPost, SocialAccount,
};
use herald_core::error::RepoError;
use herald_core::ports::{AccountStore, PostStore};

#[derive(Default)]
struct Tables {
    posts: HashMap<Uuid, ScheduledPost>,
    destinations: HashMap<Uuid, PostDestination>,
    accounts: HashMap<Uuid, SocialAccount>,
    logs: Vec<PublishLogEntry>,
}

impl Tables {
    fn statuses_of(&self, post_id: Uuid) -> Vec<DestinationStatus> {
        self.destinations
            .values()
            .filter(|d| d.post_id == post_id)
            .map(|d| d.status)
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryPublishingStore {
    tables: RwLock<Tables>,
}

impl InMemoryPublishingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_post(&self, post: ScheduledPost) {
        self.tables.write().await.posts.insert(post.id, post);
    }

    /// Add a destination. A second destination for the same
    /// (post, account) pair is rejected like the unique index would.
    pub async fn insert_destination(&self, destination: PostDestination) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .destinations
            .values()
            .any(|d| d.post_id == destination.post_id && d.account_id == destination.account_id)
        {
            return Err(RepoError::Constraint(format!(
                "destination for post {} and account {} already exists",
                destination.post_id, destination.account_id
            )));
        }
        tables.destinations.insert(destination.id, destination);
        Ok(())
    }

    pub async fn insert_account(&self, account: SocialAccount) {
        self.tables.write().await.accounts.insert(account.id, account);
    }

    /// Delete a post with its destinations. Logs are kept for audit.
    pub async fn delete_post(&self, post_id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        tables.destinations.retain(|_, d| d.post_id != post_id);
        tables.posts.remove(&post_id).is_some()
    }
}

#[async_trait]
impl PostStore for InMemoryPublishingStore {
    async fn get_post(&self, id: Uuid) -> Result<Option<ScheduledPost>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn get_destination(&self, id: Uuid) -> Result<Option<PostDestination>, RepoError> {
        Ok(self.tables.read().await.destinations.get(&id).cloned())
    }

    async fn list_destinations(&self, post_id: Uuid) -> Result<Vec<PostDestination>, RepoError> {
        let tables = self.tables.read().await;
        let mut destinations: Vec<_> = tables
            .destinations
            .values()
            .filter(|d| d.post_id == post_id)
            .cloned()
            .collect();
        destinations.sort_by_key(|d| d.id);
        Ok(destinations)
    }

    async fn record_outcome(
        &self,
        update: DestinationUpdate,
        entry: PublishLogEntry,
    ) -> Result<Vec<DestinationStatus>, RepoError> {
        let mut tables = self.tables.write().await;

        let destination = tables
            .destinations
            .get_mut(&update.destination_id)
            .ok_or(RepoError::NotFound)?;
        destination.status = update.status;
        if update.platform_post_id.is_some() {
            destination.platform_post_id = update.platform_post_id;
        }
        destination.error_message = update.error_message;
        destination.updated_at = Utc::now();
        let post_id = destination.post_id;

        tables.logs.push(entry);
        Ok(tables.statuses_of(post_id))
    }

    async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let post = tables.posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        post.status = status;
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn list_logs(&self, post_id: Uuid) -> Result<Vec<PublishLogEntry>, RepoError> {
        Ok(self
            .tables
            .read()
            .await
            .logs
            .iter()
            .filter(|l| l.post_id == post_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccountStore for InMemoryPublishingStore {
    async fn get_account(&self, id: Uuid) -> Result<Option<SocialAccount>, RepoError> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn deactivate_account(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let account = tables.accounts.get_mut(&id).ok_or(RepoError::NotFound)?;
        let was_active = account.is_active;
        account.is_active = false;
        account.updated_at = Utc::now();
        Ok(was_active)
    }
}
