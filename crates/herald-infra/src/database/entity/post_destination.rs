//! Post destination entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use herald_core::domain::PostDestination;
use herald_core::error::RepoError;

use super::corrupt;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "post_destinations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub post_id: Uuid,
    pub account_id: Uuid,
    pub status: String,
    pub platform_post_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scheduled_post::Entity",
        from = "Column::PostId",
        to = "super::scheduled_post::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ScheduledPost,
    #[sea_orm(
        belongs_to = "super::social_account::Entity",
        from = "Column::AccountId",
        to = "super::social_account::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    SocialAccount,
}

impl Related<super::scheduled_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledPost.def()
    }
}

impl Related<super::social_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SocialAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PostDestination {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            post_id: model.post_id,
            account_id: model.account_id,
            status: model
                .status
                .parse()
                .map_err(|e| corrupt("post_destinations.status", e))?,
            platform_post_id: model.platform_post_id,
            error_message: model.error_message,
            updated_at: model.updated_at.into(),
        })
    }
}

impl From<PostDestination> for ActiveModel {
    fn from(destination: PostDestination) -> Self {
        Self {
            id: Set(destination.id),
            post_id: Set(destination.post_id),
            account_id: Set(destination.account_id),
            status: Set(destination.status.as_str().to_string()),
            platform_post_id: Set(destination.platform_post_id),
            error_message: Set(destination.error_message),
            updated_at: Set(destination.updated_at.into()),
        }
    }
}
