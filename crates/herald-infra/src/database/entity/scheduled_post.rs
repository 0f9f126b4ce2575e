//! Scheduled post entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use herald_core::domain::ScheduledPost;
use herald_core::error::RepoError;

use super::corrupt;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    pub media_urls: Json,
    pub scheduled_at: DateTimeWithTimeZone,
    pub status: String,
    pub platform_options: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post_destination::Entity")]
    PostDestination,
}

impl Related<super::post_destination::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostDestination.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ScheduledPost {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            content: model.content,
            media_urls: serde_json::from_value(model.media_urls)
                .map_err(|e| corrupt("scheduled_posts.media_urls", e))?,
            scheduled_at: model.scheduled_at.into(),
            status: model
                .status
                .parse()
                .map_err(|e| corrupt("scheduled_posts.status", e))?,
            platform_options: model.platform_options,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

impl From<ScheduledPost> for ActiveModel {
    fn from(post: ScheduledPost) -> Self {
        Self {
            id: Set(post.id),
            user_id: Set(post.user_id),
            content: Set(post.content),
            media_urls: Set(serde_json::json!(post.media_urls)),
            scheduled_at: Set(post.scheduled_at.into()),
            status: Set(post.status.as_str().to_string()),
            platform_options: Set(post.platform_options),
            created_at: Set(post.created_at.into()),
            updated_at: Set(post.updated_at.into()),
        }
    }
}
