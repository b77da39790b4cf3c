use serde::{Deserialize, Serialize};

use crate::jobs::error_codes::ErrorCode;
use crate::jobs::model::{JobId, JobStatus, LaneKind};

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueVideoRequest {
    pub video_url: String,
    pub company_name: String,
    #[serde(default)]
    pub is_youtube: bool,
    #[serde(default)]
    pub create_demo: bool,
    #[serde(default)]
    pub demo_title: Option<String>,
    /// 1 = high, 2 = medium (default), 3 = low.
    #[serde(default)]
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueQaRequest {
    pub question: String,
    pub interaction_id: String,
    pub company_name: String,
    #[serde(default)]
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub lane: LaneKind,
    pub job_id: JobId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearDedupRequest {
    /// Clears only this key when set; otherwise the whole cache.
    #[serde(default)]
    pub resource_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearDedupResponse {
    pub cleared: bool,
    pub resource_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub lane: LaneKind,
    pub job_id: JobId,
    pub status: JobStatus,
    pub summary: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_error_code: Option<ErrorCode>,
    pub failure_reason: Option<String>,
    pub suggested_action: Option<String>,
}
