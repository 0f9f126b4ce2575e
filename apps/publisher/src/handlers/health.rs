//! Health check endpoint.

use actix_web::{HttpResponse, web};
use herald_shared::dto::HealthResponse;

use crate::state::AppState;

/// Health check endpoint - returns server status and the wired backends.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue_backend: state.queue_backend.to_string(),
        store_backend: state.store_backend.to_string(),
        platforms: state.platforms.iter().map(|p| p.to_string()).collect(),
    };

    HttpResponse::Ok().json(response)
}
