//! Worker secret extractor for the internal endpoints.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use std::future::{Ready, ready};
use subtle::ConstantTimeEq;

use super::error::AppError;
use crate::state::AppState;

/// Custom header accepted in place of `Authorization: Bearer`.
pub const WORKER_SECRET_HEADER: &str = "x-worker-secret";

/// Proof that the caller presented the worker secret.
///
/// ```ignore
/// async fn trigger(_auth: WorkerAuth, body: web::Json<TriggerRequest>) -> AppResult<HttpResponse> {
///     ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WorkerAuth;

impl FromRequest for WorkerAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState not found in app data");
            return ready(Err(AppError::Internal("Server configuration error".into())));
        };

        let Some(expected) = state.worker_secret.as_deref() else {
            return ready(Err(AppError::ServiceUnavailable(
                "Worker endpoints are disabled: WORKER_SECRET is not set".into(),
            )));
        };

        match presented_secret(req) {
            Some(secret) if secret_matches(secret, expected) => {
                ready(Ok(WorkerAuth))
            }
            _ => {
                tracing::warn!(path = %req.path(), "Rejected worker request");
                ready(Err(AppError::Unauthorized))
            }
        }
    }
}

/// `Authorization: Bearer <secret>` wins over `X-Worker-Secret`.
fn presented_secret(req: &HttpRequest) -> Option<&str> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    bearer.or_else(|| {
        req.headers()
            .get(WORKER_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
    })
}

/// Length still leaks; the bytes do not.
fn secret_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
