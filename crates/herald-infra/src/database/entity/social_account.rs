//! Social account entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use herald_core::domain::SocialAccount;
use herald_core::error::RepoError;

use super::corrupt;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "social_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: String,
    #[sea_orm(column_type = "Text")]
    pub access_token: String,
    pub platform_account_id: String,
    pub metadata: Json,
    pub is_active: bool,
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

impl TryFrom<Model> for SocialAccount {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            platform: model
                .platform
                .parse()
                .map_err(|e| corrupt("social_accounts.platform", e))?,
            encrypted_access_token: model.access_token,
            platform_account_id: model.platform_account_id,
            metadata: model.metadata,
            is_active: model.is_active,
            updated_at: model.updated_at.into(),
        })
    }
}

impl From<SocialAccount> for ActiveModel {
    fn from(account: SocialAccount) -> Self {
        Self {
            id: Set(account.id),
            user_id: Set(account.user_id),
            platform: Set(account.platform.as_str().to_string()),
            access_token: Set(account.encrypted_access_token),
            platform_account_id: Set(account.platform_account_id),
            metadata: Set(account.metadata),
            is_active: Set(account.is_active),
            updated_at: Set(account.updated_at.into()),
        }
    }
}
