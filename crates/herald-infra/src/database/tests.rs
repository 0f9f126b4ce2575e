use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use uuid::Uuid;

use herald_core::domain::{
    DestinationStatus, DestinationUpdate, Platform, PostStatus, PublishLogEntry,
};
use herald_core::error::RepoError;
use herald_core::ports::{AccountStore, PostStore};

use crate::database::entity::{post_destination, publish_log, scheduled_post, social_account};
use crate::database::postgres_repo::PostgresPublishingStore;

fn post_model(id: Uuid, status: &str) -> scheduled_post::Model {
    let now = Utc::now();
    scheduled_post::Model {
        id,
        user_id: Uuid::new_v4(),
        content: Some("Hello".to_owned()),
        media_urls: serde_json::json!(["https://cdn.example.com/a.png"]),
        scheduled_at: now.into(),
        status: status.to_owned(),
        platform_options: serde_json::json!({}),
        created_at: now.into(),
        updated_at: now.into(),
    }
}

fn destination_model(id: Uuid, post_id: Uuid, status: &str) -> post_destination::Model {
    post_destination::Model {
        id,
        post_id,
        account_id: Uuid::new_v4(),
        status: status.to_owned(),
        platform_post_id: None,
        error_message: None,
        updated_at: Utc::now().into(),
    }
}

#[tokio::test]
async fn test_get_post_maps_model() {
    let post_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_model(post_id, "scheduled")]])
        .into_connection();

    let store = PostgresPublishingStore::new(db);
    let post = store.get_post(post_id).await.unwrap().unwrap();

    assert_eq!(post.id, post_id);
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.media_urls, vec!["https://cdn.example.com/a.png".to_string()]);
}

#[tokio::test]
async fn test_unknown_status_is_corrupt() {
    let post_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_model(post_id, "archived")]])
        .into_connection();

    let store = PostgresPublishingStore::new(db);
    assert!(matches!(
        store.get_post(post_id).await,
        Err(RepoError::Corrupt(_))
    ));
}

#[tokio::test]
async fn test_record_outcome_returns_sibling_statuses() {
    let post_id = Uuid::new_v4();
    let destination_id = Uuid::new_v4();
    let sibling_id = Uuid::new_v4();
    let entry = PublishLogEntry::success(post_id, destination_id, Platform::Twitter, 1);

    let mut updated = destination_model(destination_id, post_id, "success");
    updated.platform_post_id = Some("tw-1".to_owned());

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // destination lookup
        .append_query_results(vec![vec![destination_model(destination_id, post_id, "pending")]])
        // post row lock
        .append_query_results(vec![vec![post_model(post_id, "publishing")]])
        // UPDATE ... RETURNING
        .append_query_results(vec![vec![updated.clone()]])
        // INSERT log ... RETURNING
        .append_query_results(vec![vec![publish_log::Model {
            id: entry.id,
            post_id,
            destination_id,
            platform: Some("twitter".to_owned()),
            status: "success".to_owned(),
            error_code: None,
            error_message: None,
            attempt: 1,
            created_at: entry.created_at.into(),
        }]])
        // sibling snapshot
        .append_query_results(vec![vec![
            updated,
            destination_model(sibling_id, post_id, "failed"),
        ]])
        .into_connection();

    let store = PostgresPublishingStore::new(db);
    let statuses = store
        .record_outcome(DestinationUpdate::success(destination_id, "tw-1"), entry)
        .await
        .unwrap();

    assert_eq!(statuses, vec![DestinationStatus::Success, DestinationStatus::Failed]);
}

#[tokio::test]
async fn test_update_post_status_missing_post() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results(vec![MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .into_connection();

    let store = PostgresPublishingStore::new(db);
    assert!(matches!(
        store.update_post_status(Uuid::new_v4(), PostStatus::Published).await,
        Err(RepoError::NotFound)
    ));
}

#[tokio::test]
async fn test_deactivate_account_reports_prior_state() {
    let account_id = Uuid::new_v4();
    let account = social_account::Model {
        id: account_id,
        user_id: Uuid::new_v4(),
        platform: "linkedin".to_owned(),
        access_token: "iv:tag:cipher".to_owned(),
        platform_account_id: "li-1".to_owned(),
        metadata: serde_json::json!({}),
        is_active: false,
        updated_at: Utc::now().into(),
    };

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results(vec![
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            },
        ])
        .append_query_results(vec![vec![account]])
        .into_connection();

    let store = PostgresPublishingStore::new(db);
    assert!(store.deactivate_account(account_id).await.unwrap());
    assert!(!store.deactivate_account(account_id).await.unwrap());
}
