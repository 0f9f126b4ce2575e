//! Queue entry point, manual trigger and queue statistics.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use herald_core::ports::EnqueueOutcome;
use herald_core::publishing::{AttemptState, TriggerReport, TriggerResult};
use herald_shared::ApiResponse;
use herald_shared::dto::{
    DestinationResult, QueueStatsResponse, ScheduleResponse, TriggerRequest, TriggerResponse,
};

use crate::middleware::error::AppResult;
use crate::middleware::worker_auth::WorkerAuth;
use crate::state::AppState;

/// Worker id recorded on leases taken by the trigger endpoint.
const TRIGGER_WORKER_ID: &str = "manual-trigger";

/// Enqueue one job per pending destination of a post.
///
/// POST /api/posts/{id}/schedule
pub async fn schedule_post(
    _auth: WorkerAuth,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();
    let outcomes = state.runner.schedule_post(post_id).await?;

    let mut response = ScheduleResponse {
        post_id,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            EnqueueOutcome::Inserted => response.inserted += 1,
            EnqueueOutcome::Updated => response.updated += 1,
            EnqueueOutcome::InFlight => response.in_flight += 1,
        }
    }

    Ok(HttpResponse::Accepted().json(ApiResponse::ok(response)))
}

/// Run every pending destination of a post now and report per destination.
///
/// POST /api/publish/trigger
pub async fn trigger(
    _auth: WorkerAuth,
    state: web::Data<AppState>,
    body: web::Json<TriggerRequest>,
) -> AppResult<HttpResponse> {
    let post_id = body.into_inner().post_id;
    tracing::info!(post_id = %post_id, "Manual trigger");

    let reports = state.runner.trigger_post(post_id, TRIGGER_WORKER_ID).await?;
    let response = TriggerResponse {
        post_id,
        destinations: reports.into_iter().map(destination_result).collect(),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// GET /api/queue/stats
pub async fn queue_stats(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let stats = state.runner.queue().stats().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(QueueStatsResponse {
        pending: stats.pending,
        processing: stats.processing,
        completed: stats.completed,
        requeued: stats.requeued,
    })))
}

fn destination_result(report: TriggerReport) -> DestinationResult {
    let mut result = DestinationResult {
        destination_id: report.destination_id,
        account_id: report.account_id,
        result: String::new(),
        state: None,
        status: None,
        retry_in_ms: None,
    };

    match report.result {
        TriggerResult::Attempted { attempt } => {
            result.result = "attempted".into();
            let state = match attempt {
                AttemptState::Succeeded => "succeeded",
                AttemptState::RetryScheduled { delay } => {
                    result.retry_in_ms = Some(delay.as_millis() as u64);
                    "retry_scheduled"
                }
                AttemptState::TerminallyFailed => "terminally_failed",
                AttemptState::Aborted => "aborted",
            };
            result.state = Some(state.into());
        }
        TriggerResult::InFlight => result.result = "in_flight".into(),
        TriggerResult::AlreadySettled { status } => {
            result.result = "already_settled".into();
            result.status = Some(status.to_string());
        }
    }

    result
}
