//! Publish log entity for SeaORM. Rows are append-only.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use herald_core::domain::{AttemptStatus, Platform, PublishLogEntry};
use herald_core::error::RepoError;

use super::corrupt;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "publish_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub post_id: Uuid,
    pub destination_id: Uuid,
    pub platform: Option<String>,
    pub status: String,
    pub error_code: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub attempt: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PublishLogEntry {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let status = match model.status.as_str() {
            "success" => AttemptStatus::Success,
            "failed" => AttemptStatus::Failed,
            other => return Err(corrupt("publish_logs.status", other)),
        };

        Ok(Self {
            id: model.id,
            post_id: model.post_id,
            destination_id: model.destination_id,
            platform: model
                .platform
                .map(|p| p.parse::<Platform>())
                .transpose()
                .map_err(|e| corrupt("publish_logs.platform", e))?,
            status,
            error_code: model.error_code,
            error_message: model.error_message,
            attempt: u32::try_from(model.attempt).map_err(|e| corrupt("publish_logs.attempt", e))?,
            created_at: model.created_at.into(),
        })
    }
}

impl From<PublishLogEntry> for ActiveModel {
    fn from(entry: PublishLogEntry) -> Self {
        Self {
            id: Set(entry.id),
            post_id: Set(entry.post_id),
            destination_id: Set(entry.destination_id),
            platform: Set(entry.platform.map(|p| p.as_str().to_string())),
            status: Set(entry.status.as_str().to_string()),
            error_code: Set(entry.error_code),
            error_message: Set(entry.error_message),
            attempt: Set(i32::try_from(entry.attempt).unwrap_or(i32::MAX)),
            created_at: Set(entry.created_at.into()),
        }
    }
}
