//! HTTP handlers and route configuration.

mod health;
mod publish;

#[cfg(test)]
mod tests;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            .route("/queue/stats", web::get().to(publish::queue_stats))
            // Worker routes (worker secret required)
            .route("/posts/{id}/schedule", web::post().to(publish::schedule_post))
            .route("/publish/trigger", web::post().to(publish::trigger)),
    );
}
