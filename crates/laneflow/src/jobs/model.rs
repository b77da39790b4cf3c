use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::error_codes::ErrorCode;

pub type JobId = u64;

/// Which lane (and therefore which executor) a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneKind {
    Video,
    Qa,
}

impl LaneKind {
    pub const ALL: [LaneKind; 2] = [LaneKind::Video, LaneKind::Qa];

    pub fn as_str(&self) -> &'static str {
        match self {
            LaneKind::Video => "video",
            LaneKind::Qa => "qa",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "video" => Some(LaneKind::Video),
            "qa" => Some(LaneKind::Qa),
            _ => None,
        }
    }
}

impl std::fmt::Display for LaneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower level is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    High = 1,
    #[default]
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn level(self) -> u8 {
        self as u8
    }

    /// Bucket index inside a lane (0 = high).
    pub fn index(self) -> usize {
        (self.level() - 1) as usize
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(format!("priority must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.level()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPayload {
    pub video_url: String,
    pub company_name: String,
    #[serde(default)]
    pub is_youtube: bool,
    /// Also persist a demo record pointing at the processed video.
    #[serde(default)]
    pub create_demo: bool,
    #[serde(default)]
    pub demo_title: Option<String>,
}

impl VideoPayload {
    pub fn new(video_url: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            company_name: company_name.into(),
            is_youtube: false,
            create_demo: false,
            demo_title: None,
        }
    }

    /// Dedup key for the external video resource.
    pub fn resource_key(&self) -> String {
        format!("{}::{}", self.video_url.trim(), self.company_name.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPayload {
    pub question: String,
    pub interaction_id: String,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobPayload {
    Video(VideoPayload),
    Qa(QaPayload),
}

impl JobPayload {
    pub fn lane(&self) -> LaneKind {
        match self {
            JobPayload::Video(_) => LaneKind::Video,
            JobPayload::Qa(_) => LaneKind::Qa,
        }
    }

    pub fn resource_key(&self) -> Option<String> {
        match self {
            JobPayload::Video(v) => Some(v.resource_key()),
            JobPayload::Qa(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOutcome {
    pub video_record_id: Uuid,
    pub company_id: Uuid,
    pub upstream_video_id: String,
    pub transcript_chunks: u32,
    pub demo_record_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaOutcome {
    pub qa_record_id: Uuid,
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobOutput {
    Video(VideoOutcome),
    Qa(QaOutcome),
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub priority: Priority,
    pub status: JobStatus,
    pub attempts: u32,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,

    pub last_error: Option<String>,
    pub last_error_code: Option<ErrorCode>,
    pub result: Option<JobOutput>,

    pub resource_key: Option<String>,
}

impl Job {
    pub fn new(id: JobId, payload: JobPayload, priority: Priority) -> Self {
        let resource_key = payload.resource_key();
        Self {
            id,
            payload,
            priority,
            status: JobStatus::Queued,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
            last_error_code: None,
            result: None,
            resource_key,
        }
    }

    pub fn lane(&self) -> LaneKind {
        self.payload.lane()
    }

    /// When the job reached its terminal state, if it has.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.failed_at)
    }
}
