use std::time::Duration;

use laneflow::jobs::ErrorCode;
use laneflow::services::{AiServiceClient, AskRequest, ProcessVideoRequest, ProcessingService};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn video_req() -> ProcessVideoRequest {
    ProcessVideoRequest {
        video_url: "https://youtu.be/abc".into(),
        company_name: "acme".into(),
        is_youtube: true,
    }
}

fn ask_req() -> AskRequest {
    AskRequest {
        question: "Does it support SSO?".into(),
        company_name: "acme".into(),
        interaction_id: "int-1".into(),
    }
}

fn client(server: &MockServer) -> AiServiceClient {
    AiServiceClient::new(format!("{}/", server.uri()), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn process_video_posts_the_request_and_decodes_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process-video"))
        .and(body_partial_json(json!({
            "video_url": "https://youtu.be/abc",
            "company_name": "acme",
            "is_youtube": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video_id": "vid-42",
            "transcript_chunks": 7
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client(&server).process_video(&video_req()).await.unwrap();
    assert_eq!(resp.video_id, "vid-42");
    assert_eq!(resp.transcript_chunks, 7);
    assert_eq!(resp.title, None);
}

#[tokio::test]
async fn ask_decodes_answer_and_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Yes, via SAML.",
            "confidence": 0.93,
            "sources": ["vid-42"]
        })))
        .mount(&server)
        .await;

    let resp = client(&server).answer_question(&ask_req()).await.unwrap();
    assert_eq!(resp.answer, "Yes, via SAML.");
    assert_eq!(resp.sources, vec!["vid-42".to_string()]);
}

#[tokio::test]
async fn health_succeeds_on_2xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    client(&server).health().await.unwrap();
}

#[tokio::test]
async fn status_codes_map_to_error_codes() {
    for (status, expected) in [
        (502, ErrorCode::DependencyDown),
        (503, ErrorCode::DependencyDown),
        (504, ErrorCode::DependencyDown),
        (404, ErrorCode::NotFound),
        (500, ErrorCode::Unknown),
        (422, ErrorCode::Unknown),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = client(&server).answer_question(&ask_req()).await.unwrap_err();
        assert_eq!(err.code(), expected, "status {status}");
        assert!(err.to_string().contains("nope"), "{err}");
    }
}

#[tokio::test]
async fn undecodable_body_is_a_bad_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process-video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = client(&server).process_video(&video_req()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadResponse);
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "answer": "late", "confidence": 0.5 }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = AiServiceClient::new(server.uri(), Duration::from_millis(200)).unwrap();
    let err = client.answer_question(&ask_req()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Timeout);
}

#[tokio::test]
async fn unreachable_service_is_dependency_down() {
    let client = AiServiceClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
    let err = client.health().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DependencyDown);
}
