// crates/laneflow/src/jobs/error_codes.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Timeout,
    DependencyDown,
    BadResponse,
    Persistence,
    NotFound,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::DependencyDown => "DEPENDENCY_DOWN",
            Self::BadResponse => "BAD_RESPONSE",
            Self::Persistence => "PERSISTENCE",
            Self::NotFound => "NOT_FOUND",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn suggested_action(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Timeout => {
            "Retried automatically. If it keeps timing out, raise the job timeout or check AI service latency."
        }
        ErrorCode::DependencyDown => {
            "Non-retryable. Check AI service health, then re-submit the job once it is reachable."
        }
        ErrorCode::BadResponse => {
            "Non-retryable. The AI service returned a body we could not use; compare its response schema with the client."
        }
        ErrorCode::Persistence => {
            "Non-retryable. Inspect the database error; fix connectivity or constraint violations and re-submit."
        }
        ErrorCode::NotFound => {
            "Non-retryable. A referenced record (company, video) is missing; create it before re-submitting."
        }
        ErrorCode::Unknown => {
            "Retried automatically. Inspect last_error + logs; add a typed mapping once the cause is understood."
        }
    }
}

/// Failure of a single execution attempt, classified where it originates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    #[error("job timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },

    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed upstream response: {0}")]
    UpstreamMalformedResponse(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl JobError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::UpstreamMalformedResponse(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TimedOut { .. } => ErrorCode::Timeout,
            Self::UpstreamUnavailable(_) => ErrorCode::DependencyDown,
            Self::UpstreamMalformedResponse(_) => ErrorCode::BadResponse,
            Self::Persistence(_) => ErrorCode::Persistence,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Other(_) => ErrorCode::Unknown,
        }
    }
}

/// Enqueue-time rejection. The job is never created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("video is already being processed: {resource_key}")]
    DuplicateInProgress { resource_key: String },

    #[error("video has already been processed: {resource_key}")]
    AlreadyProcessed { resource_key: String },
}

impl EnqueueError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateInProgress { .. } => "DUPLICATE_IN_PROGRESS",
            Self::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
        }
    }

    pub fn resource_key(&self) -> &str {
        match self {
            Self::DuplicateInProgress { resource_key } | Self::AlreadyProcessed { resource_key } => {
                resource_key
            }
        }
    }
}
