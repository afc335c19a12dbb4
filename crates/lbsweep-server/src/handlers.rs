use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use lbsweep_core::Job;
use serde::Serialize;

use crate::error::ApiError;
use crate::metrics::render_metrics;
use crate::reconcile::{CheckReport, FirewallReport, reconcile_firewalls, run_check_pass};
use crate::server::AppState;
use crate::worker::JobOutcome;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

pub async fn metrics() -> Response {
    match render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

/// Lists chain roots and enqueues one evaluate job per root.
pub async fn check_forwarding_rules(
    State(state): State<AppState>,
) -> Result<Json<CheckReport>, ApiError> {
    run_check_pass(&state.compute, &state.queue, &state.config.sweep)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to list forwarding rules");
            ApiError::upstream(e.to_string())
        })
}

pub async fn check_firewall_rules(
    State(state): State<AppState>,
) -> Result<Json<FirewallReport>, ApiError> {
    let sweep = &state.config.sweep;
    let report = reconcile_firewalls(&state.compute, &sweep.firewall_tag_prefix, sweep.dry_run)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "firewall pass failed"))?;
    Ok(Json(report))
}

#[derive(Serialize)]
struct RetryResponse {
    outcome: JobOutcome,
}

/// Executes one delivered job. Any non-2xx answer makes the queue redeliver.
///
/// A body that does not decode as a job never will, so it is acknowledged
/// and dropped. This covers a delete task whose expiry cannot be read.
pub async fn run_job(
    State(state): State<AppState>,
    payload: Result<Json<Job>, JsonRejection>,
) -> Response {
    let Json(job) = match payload {
        Ok(job) => job,
        Err(rejection) => {
            tracing::warn!(
                error = %rejection,
                status = rejection.status().as_u16(),
                "dropping undecodable job"
            );
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    match state.runner.run(&job).await {
        JobOutcome::Ack => StatusCode::NO_CONTENT.into_response(),
        outcome @ JobOutcome::Retry => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RetryResponse { outcome }),
        )
            .into_response(),
    }
}
