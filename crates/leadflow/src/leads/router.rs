use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::assignment::ApplyError;
use super::domain::{LeadId, LeadIntake, RuleId};
use super::repository::{LeadNotifier, LeadRepository, RepositoryError};
use super::scoring::InsightModel;
use super::service::{
    ActivitySubmission, EventSubmission, LeadPipelineService, PipelineError, RuleDraft,
};

/// Router builder exposing HTTP endpoints for intake, scoring, and
/// assignment administration.
pub fn lead_router<R, N, M>(service: Arc<LeadPipelineService<R, N, M>>) -> Router
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(intake_handler::<R, N, M>))
        .route("/api/v1/leads/:lead_id", get(view_handler::<R, N, M>))
        .route(
            "/api/v1/leads/:lead_id/activities",
            post(activity_handler::<R, N, M>),
        )
        .route(
            "/api/v1/leads/:lead_id/events",
            post(event_handler::<R, N, M>),
        )
        .route(
            "/api/v1/leads/:lead_id/rescore",
            post(rescore_handler::<R, N, M>),
        )
        .route(
            "/api/v1/leads/:lead_id/history",
            get(history_handler::<R, N, M>),
        )
        .route(
            "/api/v1/assignment-rules",
            post(create_rule_handler::<R, N, M>),
        )
        .route(
            "/api/v1/assignment-rules/:rule_id/test",
            post(probe_handler::<R, N, M>),
        )
        .route(
            "/api/v1/assignment-rules/:rule_id/apply",
            post(apply_handler::<R, N, M>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleTargetRequest {
    pub(crate) lead_id: String,
}

pub(crate) async fn intake_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    axum::Json(intake): axum::Json<LeadIntake>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.create_lead(intake, Utc::now()) {
        Ok(outcome) => (StatusCode::ACCEPTED, axum::Json(outcome)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn view_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.lead_view(&LeadId(lead_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn activity_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(lead_id): Path<String>,
    axum::Json(submission): axum::Json<ActivitySubmission>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.record_activity(&LeadId(lead_id), submission, Utc::now()) {
        Ok(outcome) => (StatusCode::ACCEPTED, axum::Json(outcome)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn event_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(lead_id): Path<String>,
    axum::Json(submission): axum::Json<EventSubmission>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.record_event(&LeadId(lead_id), submission, Utc::now()) {
        Ok(outcome) => (StatusCode::ACCEPTED, axum::Json(outcome)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn rescore_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.rescore(&LeadId(lead_id), Utc::now()) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn history_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.history(&LeadId(lead_id)) {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn create_rule_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    axum::Json(draft): axum::Json<RuleDraft>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.create_rule(draft, Utc::now()) {
        Ok(rule) => (StatusCode::CREATED, axum::Json(rule)).into_response(),
        Err(PipelineError::Validation(err)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn probe_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(rule_id): Path<String>,
    axum::Json(request): axum::Json<RuleTargetRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.probe_rule(&RuleId(rule_id), &LeadId(request.lead_id), Utc::now()) {
        Ok(probe) => (StatusCode::OK, axum::Json(probe)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn apply_handler<R, N, M>(
    State(service): State<Arc<LeadPipelineService<R, N, M>>>,
    Path(rule_id): Path<String>,
    axum::Json(request): axum::Json<RuleTargetRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    match service.apply_rule(&RuleId(rule_id), &LeadId(request.lead_id), Utc::now()) {
        Ok(assignment) => (StatusCode::OK, axum::Json(assignment)).into_response(),
        Err(ApplyError::AlreadyAssigned) => {
            let payload = json!({ "error": "lead already has an active assignment" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(err @ (ApplyError::RuleInactive
        | ApplyError::ConditionsNotMet
        | ApplyError::NoEligibleRepresentative)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(ApplyError::Repository(RepositoryError::NotFound)) => not_found_response(),
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn pipeline_error_response(err: PipelineError) -> Response {
    match err {
        PipelineError::Repository(RepositoryError::NotFound) => not_found_response(),
        PipelineError::Repository(RepositoryError::Conflict) => {
            let payload = json!({ "error": "record already exists" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn not_found_response() -> Response {
    let payload = json!({ "error": "record not found" });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}
