use std::sync::Arc;

use actix_web::{App, http::StatusCode, test, web};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use herald_core::domain::{Platform, PostDestination, ScheduledPost, SocialAccount};
use herald_core::ports::AdapterRegistry;
use herald_core::publishing::{Dispatcher, PublishRunner, RetryPolicy};
use herald_infra::{InMemoryJobQueue, InMemoryPublishingStore, LogNotifier, PlaintextCipher};

use super::configure_routes;
use crate::state::AppState;

const SECRET: &str = "worker-secret";

struct Fixture {
    state: AppState,
    store: Arc<InMemoryPublishingStore>,
}

/// In-memory pipeline without adapters: every dispatch fails as unsupported.
fn fixture(worker_secret: Option<&str>) -> Fixture {
    let store = Arc::new(InMemoryPublishingStore::new());
    let queue = Arc::new(InMemoryJobQueue::default());
    let dispatcher = Dispatcher::new(
        store.clone(),
        store.clone(),
        Arc::new(PlaintextCipher),
        AdapterRegistry::new(),
        RetryPolicy::default(),
    );
    let runner = PublishRunner::new(queue, store.clone(), Arc::new(dispatcher), Arc::new(LogNotifier));

    Fixture {
        state: AppState {
            runner: Arc::new(runner),
            platforms: vec![],
            queue_backend: "memory",
            store_backend: "memory",
            worker_secret: worker_secret.map(Arc::from),
        },
        store,
    }
}

async fn seed_post(store: &InMemoryPublishingStore) -> Uuid {
    let user_id = Uuid::new_v4();
    let post = ScheduledPost::new(user_id, Some("Hello".into()), vec![], Utc::now()).unwrap();
    let account = SocialAccount::new(user_id, Platform::Twitter, "token", "acct");
    let destination = PostDestination::new(post.id, account.id);

    let post_id = post.id;
    store.insert_post(post).await;
    store.insert_account(account).await;
    store.insert_destination(destination).await.unwrap();
    post_id
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_reports_backends() {
    let fx = fixture(Some(SECRET));
    let app = app!(fx.state);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["queueBackend"], "memory");
    assert_eq!(body["storeBackend"], "memory");
}

#[actix_web::test]
async fn test_trigger_requires_secret() {
    let fx = fixture(Some(SECRET));
    let app = app!(fx.state);

    let req = test::TestRequest::post()
        .uri("/api/publish/trigger")
        .set_json(serde_json::json!({ "postId": Uuid::new_v4() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/publish/trigger")
        .insert_header(("Authorization", "Bearer wrong"))
        .set_json(serde_json::json!({ "postId": Uuid::new_v4() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_trigger_disabled_without_configured_secret() {
    let fx = fixture(None);
    let app = app!(fx.state);

    let req = test::TestRequest::post()
        .uri("/api/publish/trigger")
        .insert_header(("X-Worker-Secret", SECRET))
        .set_json(serde_json::json!({ "postId": Uuid::new_v4() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_trigger_unknown_post_is_404() {
    let fx = fixture(Some(SECRET));
    let app = app!(fx.state);

    let req = test::TestRequest::post()
        .uri("/api/publish/trigger")
        .insert_header(("X-Worker-Secret", SECRET))
        .set_json(serde_json::json!({ "postId": Uuid::new_v4() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_trigger_reports_each_destination() {
    let fx = fixture(Some(SECRET));
    let post_id = seed_post(&fx.store).await;
    let app = app!(fx.state);

    let req = test::TestRequest::post()
        .uri("/api/publish/trigger")
        .insert_header(("Authorization", format!("Bearer {SECRET}")))
        .set_json(serde_json::json!({ "postId": post_id }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let destinations = body["data"]["destinations"].as_array().unwrap();
    assert_eq!(destinations.len(), 1);
    assert_eq!(destinations[0]["result"], "attempted");
    // No adapter is registered, so the attempt fails terminally.
    assert_eq!(destinations[0]["state"], "terminally_failed");

    let req = test::TestRequest::post()
        .uri("/api/publish/trigger")
        .insert_header(("Authorization", format!("Bearer {SECRET}")))
        .set_json(serde_json::json!({ "postId": post_id }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let destinations = body["data"]["destinations"].as_array().unwrap();
    assert_eq!(destinations[0]["result"], "already_settled");
    assert_eq!(destinations[0]["status"], "failed");
}

#[actix_web::test]
async fn test_schedule_then_stats() {
    let fx = fixture(Some(SECRET));
    let post_id = seed_post(&fx.store).await;
    let app = app!(fx.state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/posts/{post_id}/schedule"))
        .insert_header(("X-Worker-Secret", SECRET))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["inserted"], 1);

    // Scheduling again reschedules in place.
    let req = test::TestRequest::post()
        .uri(&format!("/api/posts/{post_id}/schedule"))
        .insert_header(("X-Worker-Secret", SECRET))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["updated"], 1);

    let req = test::TestRequest::get().uri("/api/queue/stats").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["pending"], 1);
    assert_eq!(body["data"]["processing"], 0);
}
