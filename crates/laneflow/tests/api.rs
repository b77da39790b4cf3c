mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{fail_with, queue_with, succeed, test_config, wait_for_job};
use laneflow::api::{router, ApiState};
use laneflow::jobs::{JobError, JobQueue, JobStatus, LaneKind};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(queue: &JobQueue) -> Router {
    router(ApiState {
        queue: queue.clone(),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn video_body() -> Value {
    json!({ "video_url": "https://youtu.be/abc", "company_name": "acme", "priority": 1 })
}

#[tokio::test]
async fn health_is_ok() {
    let queue = queue_with(test_config(), succeed(), succeed());
    let (status, body) = send(&app(&queue), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn enqueue_video_accepts_then_rejects_duplicates() {
    let queue = queue_with(test_config(), succeed(), succeed());
    let app = app(&queue);

    let (status, body) = send(&app, "POST", "/jobs/video", Some(video_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["lane"], "video");
    assert_eq!(v["job_id"], 1);

    let (status, body) = send(&app, "POST", "/jobs/video", Some(video_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["code"], "DUPLICATE_IN_PROGRESS");
    assert_eq!(v["resource_key"], "https://youtu.be/abc::acme");
    assert!(v["error"].as_str().unwrap().contains("already"), "{body}");
}

#[tokio::test]
async fn enqueue_validates_input() {
    let queue = queue_with(test_config(), succeed(), succeed());
    let app = app(&queue);

    let (status, _) = send(
        &app,
        "POST",
        "/jobs/video",
        Some(json!({ "video_url": "https://youtu.be/abc", "company_name": "acme", "priority": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/jobs/qa",
        Some(json!({ "question": " ", "interaction_id": "i", "company_name": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "question is required");

    assert_eq!(queue.status().video.waiting, 0);
    assert_eq!(queue.status().qa.waiting, 0);
}

#[tokio::test]
async fn get_and_cancel_a_queued_job() {
    let queue = queue_with(test_config(), succeed(), succeed());
    let app = app(&queue);

    let (status, _) = send(
        &app,
        "POST",
        "/jobs/qa",
        Some(json!({ "question": "SSO?", "interaction_id": "i-1", "company_name": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, "GET", "/jobs/qa/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let job: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(job["status"], "queued");
    assert_eq!(job["attempts"], 0);
    assert_eq!(job["priority"], 2);

    let (status, _) = send(&app, "GET", "/jobs/video/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/jobs/audio/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", "/jobs/qa/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", "/jobs/qa/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn explain_reports_reason_and_suggested_action() {
    let queue = queue_with(
        test_config(),
        succeed(),
        fail_with(JobError::not_found("company \"acme\"")),
    );
    let app = app(&queue);

    send(
        &app,
        "POST",
        "/jobs/qa",
        Some(json!({ "question": "SSO?", "interaction_id": "i-1", "company_name": "acme" })),
    )
    .await;
    queue.dispatch_pending();
    wait_for_job(&queue, LaneKind::Qa, 1, |j| j.status == JobStatus::Failed).await;

    let (status, body) = send(&app, "GET", "/jobs/qa/1/explain", None).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], "failed");
    assert_eq!(v["last_error_code"], "NOT_FOUND");
    assert_eq!(v["failure_reason"], "NON_RETRYABLE");
    assert!(v["suggested_action"].as_str().unwrap().starts_with("Non-retryable"));
    assert_eq!(v["summary"], "Failed after 1 attempt(s). Reason: NON_RETRYABLE.");
}

#[tokio::test]
async fn dedup_clear_with_and_without_a_key() {
    let queue = queue_with(test_config(), succeed(), succeed());
    let app = app(&queue);
    send(&app, "POST", "/jobs/video", Some(video_body())).await;

    let key = "https://youtu.be/abc::acme";
    let (status, body) = send(&app, "POST", "/dedup/clear", Some(json!({ "resource_key": key }))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["cleared"], true);
    assert_eq!(v["resource_key"], key);

    let (status, _) = send(&app, "POST", "/jobs/video", Some(video_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, "POST", "/dedup/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["cleared"], true);
    assert!(queue.status().processing_resource_keys.is_empty());
}

#[tokio::test]
async fn status_and_prometheus_reflect_the_queue() {
    let queue = queue_with(test_config(), succeed(), succeed());
    let app = app(&queue);
    send(&app, "POST", "/jobs/video", Some(video_body())).await;

    let (status, body) = send(&app, "GET", "/queue/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["video"]["waiting"], 1);
    assert_eq!(v["video"]["waiting_by_priority"]["high"], 1);
    assert_eq!(v["video"]["max_concurrent"], 2);
    assert_eq!(v["qa"]["max_concurrent"], 10);
    assert_eq!(v["running"], false);
    assert_eq!(v["processing_resource_keys"][0], "https://youtu.be/abc::acme");

    let (status, body) = send(&app, "GET", "/metrics/prom", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("laneflow_jobs_waiting{lane=\"video\"} 1"), "{body}");
    assert!(body.contains("laneflow_jobs_waiting{lane=\"qa\"} 0"), "{body}");
    assert!(body.contains("laneflow_dispatcher_running 0"), "{body}");
}
