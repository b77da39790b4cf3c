use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::models::{
    ClearDedupRequest, ClearDedupResponse, EnqueueQaRequest, EnqueueResponse, EnqueueVideoRequest,
    ExplainResponse,
};
use crate::jobs::error_codes::{suggested_action, EnqueueError};
use crate::jobs::metrics::render_prometheus;
use crate::jobs::model::{Job, JobId, JobStatus, LaneKind, Priority, QaPayload, VideoPayload};
use crate::jobs::queue::JobQueue;
use crate::jobs::retry::{classify_error, ErrorClass, FailReason};

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub queue: JobQueue,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Producers
        .route("/jobs/video", post(enqueue_video))
        .route("/jobs/qa", post(enqueue_qa))
        // Admin / inspect
        .route("/jobs/:lane/:id", get(get_job).delete(cancel_job))
        .route("/jobs/:lane/:id/explain", get(explain_job))
        .route("/queue/status", get(queue_status))
        .route("/dedup/clear", post(clear_dedup))
        // Metrics
        .route("/metrics/prom", get(metrics_prom))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_key: Option<String>,
}

impl ErrorBody {
    fn message(error: String) -> Self {
        Self {
            error,
            code: None,
            resource_key: None,
        }
    }
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::message(format!("{what} not found"))),
    )
        .into_response()
}

fn enqueue_err(e: EnqueueError) -> Response {
    (
        StatusCode::CONFLICT,
        Json(ErrorBody {
            error: e.to_string(),
            code: Some(e.code()),
            resource_key: Some(e.resource_key().to_string()),
        }),
    )
        .into_response()
}

fn parse_priority(level: Option<u8>) -> Result<Priority, (StatusCode, String)> {
    match level {
        None => Ok(Priority::default()),
        Some(level) => Priority::try_from(level).map_err(|e| (StatusCode::BAD_REQUEST, e)),
    }
}

fn parse_lane(lane: &str) -> Result<LaneKind, Response> {
    LaneKind::parse(lane).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::message(format!(
                "unknown lane {lane:?} (expected video or qa)"
            ))),
        )
            .into_response()
    })
}

pub async fn enqueue_video(
    State(state): State<ApiState>,
    Json(body): Json<EnqueueVideoRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), Response> {
    if body.video_url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "video_url is required").into_response());
    }
    if body.company_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "company_name is required").into_response());
    }
    let priority = parse_priority(body.priority).map_err(IntoResponse::into_response)?;

    let payload = VideoPayload {
        video_url: body.video_url,
        company_name: body.company_name,
        is_youtube: body.is_youtube,
        create_demo: body.create_demo,
        demo_title: body.demo_title,
    };

    let job_id = state
        .queue
        .enqueue_video(payload, priority)
        .map_err(enqueue_err)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            lane: LaneKind::Video,
            job_id,
        }),
    ))
}

pub async fn enqueue_qa(
    State(state): State<ApiState>,
    Json(body): Json<EnqueueQaRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, String)> {
    if body.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".into()));
    }
    if body.company_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "company_name is required".into()));
    }
    let priority = parse_priority(body.priority)?;

    let job_id = state.queue.enqueue_qa(
        QaPayload {
            question: body.question,
            interaction_id: body.interaction_id,
            company_name: body.company_name,
        },
        priority,
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            lane: LaneKind::Qa,
            job_id,
        }),
    ))
}

pub async fn get_job(
    Path((lane, id)): Path<(String, JobId)>,
    State(state): State<ApiState>,
) -> Response {
    let lane = match parse_lane(&lane) {
        Ok(lane) => lane,
        Err(resp) => return resp,
    };

    match state.queue.get_job(id, lane) {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => not_found("job"),
    }
}

pub async fn cancel_job(
    Path((lane, id)): Path<(String, JobId)>,
    State(state): State<ApiState>,
) -> Response {
    let lane = match parse_lane(&lane) {
        Ok(lane) => lane,
        Err(resp) => return resp,
    };

    match state.queue.cancel_queued(id, lane) {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => not_found("queued job"),
    }
}

pub async fn explain_job(
    Path((lane, id)): Path<(String, JobId)>,
    State(state): State<ApiState>,
) -> Response {
    let lane = match parse_lane(&lane) {
        Ok(lane) => lane,
        Err(resp) => return resp,
    };

    let Some(job) = state.queue.get_job(id, lane) else {
        return not_found("job");
    };

    let max_attempts = state.queue.config().retry.max_attempts;
    (StatusCode::OK, Json(explain(&job, max_attempts))).into_response()
}

fn explain(job: &Job, max_attempts: u32) -> ExplainResponse {
    let failure_reason = match (job.status, job.last_error_code) {
        (JobStatus::Failed, Some(code)) => Some(match classify_error(code) {
            ErrorClass::NonRetryable => FailReason::NonRetryable,
            ErrorClass::Retryable => FailReason::MaxAttemptsExceeded,
        }),
        _ => None,
    };

    let summary = match job.status {
        JobStatus::Completed => format!("Completed after {} failed attempt(s).", job.attempts),
        JobStatus::Processing => format!("Running attempt {} of {}.", job.attempts + 1, max_attempts),
        JobStatus::Failed => format!(
            "Failed after {} attempt(s). Reason: {}.",
            job.attempts.max(1),
            failure_reason.map_or("UNKNOWN", |r| r.as_str())
        ),
        JobStatus::Queued if job.last_error.is_some() => format!(
            "Retry scheduled after {} failed attempt(s) of {}.",
            job.attempts, max_attempts
        ),
        JobStatus::Queued => "Queued and waiting to run.".to_string(),
    };

    ExplainResponse {
        lane: job.lane(),
        job_id: job.id,
        status: job.status,
        summary,
        attempts: job.attempts,
        last_error: job.last_error.clone(),
        last_error_code: job.last_error_code,
        failure_reason: failure_reason.map(|r| r.as_str().to_string()),
        suggested_action: job
            .last_error_code
            .map(|code| suggested_action(code).to_string()),
    }
}

pub async fn queue_status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.queue.status())
}

pub async fn clear_dedup(
    State(state): State<ApiState>,
    body: Option<Json<ClearDedupRequest>>,
) -> Json<ClearDedupResponse> {
    let resource_key = body
        .and_then(|Json(req)| req.resource_key)
        .filter(|k| !k.trim().is_empty());

    let cleared = match &resource_key {
        Some(key) => state.queue.clear_resource(key),
        None => {
            state.queue.clear_dedup_cache();
            true
        }
    };

    Json(ClearDedupResponse {
        cleared,
        resource_key,
    })
}

pub async fn metrics_prom(State(state): State<ApiState>) -> Response {
    let body = render_prometheus(&state.queue.status());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
