//! SeaORM entities for the publishing tables.

pub mod post_destination;
pub mod publish_log;
pub mod scheduled_post;
pub mod social_account;

use herald_core::error::RepoError;

pub(crate) fn corrupt(table: &str, e: impl std::fmt::Display) -> RepoError {
    RepoError::Corrupt(format!("{table}: {e}"))
}
