//! PostgreSQL publishing store.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use herald_core::domain::{
    DestinationStatus, DestinationUpdate, PostDestination, PostStatus, PublishLogEntry,
    ScheduledPost, SocialAccount,
};
use herald_core::error::RepoError;
use herald_core::ports::{AccountStore, PostStore};

use super::entity::{corrupt, post_destination, publish_log, scheduled_post, social_account};

fn db_err(e: DbErr) -> RepoError {
    match e {
        DbErr::Conn(e) => RepoError::Connection(e.to_string()),
        DbErr::ConnectionAcquire(e) => RepoError::Connection(e.to_string()),
        other => {
            let message = other.to_string();
            if message.contains("duplicate") || message.contains("unique") {
                RepoError::Constraint(message)
            } else {
                RepoError::Query(message)
            }
        }
    }
}

/// Posts, destinations, logs and accounts in one Postgres database.
pub struct PostgresPublishingStore {
    db: DbConn,
}

impl PostgresPublishingStore {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostStore for PostgresPublishingStore {
    async fn get_post(&self, id: Uuid) -> Result<Option<ScheduledPost>, RepoError> {
        scheduled_post::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(ScheduledPost::try_from)
            .transpose()
    }

    async fn get_destination(&self, id: Uuid) -> Result<Option<PostDestination>, RepoError> {
        post_destination::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(PostDestination::try_from)
            .transpose()
    }

    async fn list_destinations(&self, post_id: Uuid) -> Result<Vec<PostDestination>, RepoError> {
        post_destination::Entity::find()
            .filter(post_destination::Column::PostId.eq(post_id))
            .order_by_asc(post_destination::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(PostDestination::try_from)
            .collect()
    }

    async fn record_outcome(
        &self,
        update: DestinationUpdate,
        entry: PublishLogEntry,
    ) -> Result<Vec<DestinationStatus>, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let destination = post_destination::Entity::find_by_id(update.destination_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(RepoError::NotFound)?;
        let post_id = destination.post_id;

        // Outcomes for sibling destinations serialize on the post row, so each
        // sees the statuses committed before it.
        scheduled_post::Entity::find_by_id(post_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?;

        let mut active = destination.into_active_model();
        active.status = Set(update.status.as_str().to_string());
        if let Some(platform_post_id) = update.platform_post_id {
            active.platform_post_id = Set(Some(platform_post_id));
        }
        active.error_message = Set(update.error_message);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(db_err)?;

        publish_log::ActiveModel::from(entry)
            .insert(&txn)
            .await
            .map_err(db_err)?;

        let statuses = post_destination::Entity::find()
            .filter(post_destination::Column::PostId.eq(post_id))
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|d| {
                d.status
                    .parse::<DestinationStatus>()
                    .map_err(|e| corrupt("post_destinations.status", e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        txn.commit().await.map_err(db_err)?;
        Ok(statuses)
    }

    async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), RepoError> {
        let result = scheduled_post::Entity::update_many()
            .col_expr(scheduled_post::Column::Status, Expr::value(status.as_str()))
            .col_expr(scheduled_post::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(scheduled_post::Column::Id.eq(post_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        tracing::debug!(post_id = %post_id, status = %status, "Post status updated");
        Ok(())
    }

    async fn list_logs(&self, post_id: Uuid) -> Result<Vec<PublishLogEntry>, RepoError> {
        publish_log::Entity::find()
            .filter(publish_log::Column::PostId.eq(post_id))
            .order_by_asc(publish_log::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(PublishLogEntry::try_from)
            .collect()
    }
}

#[async_trait]
impl AccountStore for PostgresPublishingStore {
    async fn get_account(&self, id: Uuid) -> Result<Option<SocialAccount>, RepoError> {
        social_account::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(SocialAccount::try_from)
            .transpose()
    }

    async fn deactivate_account(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = social_account::Entity::update_many()
            .col_expr(social_account::Column::IsActive, Expr::value(false))
            .col_expr(social_account::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(social_account::Column::Id.eq(id))
            .filter(social_account::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected > 0 {
            return Ok(true);
        }

        match social_account::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        {
            Some(_) => Ok(false),
            None => Err(RepoError::NotFound),
        }
    }
}
