//! Collaborators the executors call out to: the AI processing service and the
//! record store. Both sit behind traits so tests can swap in fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::error_codes::JobError;

pub mod ai_client;
pub mod store;

pub use ai_client::AiServiceClient;
pub use store::PgStore;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessVideoRequest {
    pub video_url: String,
    pub company_name: String,
    pub is_youtube: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVideoResponse {
    pub video_id: String,
    #[serde(default)]
    pub transcript_chunks: u32,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub company_name: String,
    pub interaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewVideoRecord {
    pub company_id: Uuid,
    pub video_url: String,
    pub is_youtube: bool,
    pub upstream_video_id: String,
    pub transcript_chunks: u32,
}

#[derive(Debug, Clone)]
pub struct NewDemoRecord {
    pub company_id: Uuid,
    pub video_id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct NewQaRecord {
    pub company_id: Uuid,
    pub interaction_id: String,
    pub question: String,
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<String>,
}

#[async_trait]
pub trait ProcessingService: Send + Sync {
    async fn health(&self) -> Result<(), JobError>;

    async fn process_video(&self, req: &ProcessVideoRequest) -> Result<ProcessVideoResponse, JobError>;

    async fn answer_question(&self, req: &AskRequest) -> Result<AskResponse, JobError>;
}

/// Every failure is reported as `JobError::Persistence` or `JobError::NotFound`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_company(&self, name: &str) -> Result<Option<Company>, JobError>;

    async fn upsert_company(&self, name: &str) -> Result<Company, JobError>;

    async fn insert_video(&self, rec: &NewVideoRecord) -> Result<Uuid, JobError>;

    async fn insert_demo(&self, rec: &NewDemoRecord) -> Result<Uuid, JobError>;

    async fn insert_qa(&self, rec: &NewQaRecord) -> Result<Uuid, JobError>;
}
