//! HTTP client for the AI processing service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::jobs::error_codes::JobError;
use crate::services::{
    AskRequest, AskResponse, ProcessVideoRequest, ProcessVideoResponse, ProcessingService,
};

#[derive(Clone)]
pub struct AiServiceClient {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl AiServiceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> JobError {
        if e.is_timeout() {
            JobError::TimedOut {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            JobError::unavailable(format!("{endpoint}: {e}"))
        } else if e.is_decode() {
            JobError::malformed(format!("{endpoint}: {e}"))
        } else {
            JobError::other(format!("{endpoint} request failed: {e}"))
        }
    }

    async fn check_status(&self, endpoint: &str, response: Response) -> Result<Response, JobError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = format!("{endpoint} returned {status}: {}", body.trim());

        Err(match status {
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                JobError::unavailable(detail)
            }
            StatusCode::NOT_FOUND => JobError::not_found(detail),
            _ => JobError::other(detail),
        })
    }

    async fn decode<T: DeserializeOwned>(&self, endpoint: &str, response: Response) -> Result<T, JobError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| JobError::malformed(format!("{endpoint}: {e}")))
    }
}

#[async_trait]
impl ProcessingService for AiServiceClient {
    async fn health(&self) -> Result<(), JobError> {
        let endpoint = "GET /health";
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        self.check_status(endpoint, response).await?;
        Ok(())
    }

    async fn process_video(&self, req: &ProcessVideoRequest) -> Result<ProcessVideoResponse, JobError> {
        let endpoint = "POST /process-video";
        debug!(video_url = %req.video_url, company = %req.company_name, "submitting video");

        let response = self
            .client
            .post(self.url("/process-video"))
            .json(req)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let response = self.check_status(endpoint, response).await?;
        self.decode(endpoint, response).await
    }

    async fn answer_question(&self, req: &AskRequest) -> Result<AskResponse, JobError> {
        let endpoint = "POST /ask";
        debug!(interaction_id = %req.interaction_id, company = %req.company_name, "submitting question");

        let response = self
            .client
            .post(self.url("/ask"))
            .json(req)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let response = self.check_status(endpoint, response).await?;
        self.decode(endpoint, response).await
    }
}
