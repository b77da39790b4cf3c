use std::time::Duration;

use crate::jobs::history::RetentionPolicy;
use crate::jobs::queue::QueueConfig;
use crate::jobs::retry::RetryConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime configuration, loaded from the environment (and `.env`).
/// Each setting has a `LANEFLOW_*` name and, for most, a legacy fallback name.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// `None` when the admin API is switched off.
    pub admin_addr: Option<String>,
    pub migrate_on_startup: bool,
    pub ai_service_url: String,
    pub ai_timeout: Duration,
    pub log_format: LogFormat,
    pub maintenance_interval: Duration,
    pub queue: QueueConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let admin_addr = match env_or_fallback("LANEFLOW_ADMIN_ADDR", "ADMIN_ADDR") {
            Some(s) => normalize_optional_addr(&s),
            None => Some("127.0.0.1:8080".to_string()),
        };

        let migrate_on_startup = env_bool("LANEFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        let ai_service_url = env_or_fallback("LANEFLOW_AI_SERVICE_URL", "AI_SERVICE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());

        let ai_timeout_ms = env_u64("LANEFLOW_AI_TIMEOUT_MS", Some("AI_SERVICE_TIMEOUT"), 120_000)
            .clamp(100, 30 * 60 * 1000);

        let log_format = match std::env::var("LANEFLOW_LOG_FORMAT")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let maintenance_secs =
            env_u64("LANEFLOW_MAINTENANCE_INTERVAL_SECS", None, 60).clamp(1, 24 * 60 * 60);

        Ok(Self {
            database_url,
            admin_addr,
            migrate_on_startup,
            ai_service_url,
            ai_timeout: Duration::from_millis(ai_timeout_ms),
            log_format,
            maintenance_interval: Duration::from_secs(maintenance_secs),
            queue: queue_config_from_env(),
        })
    }
}

/// The queue-only settings. Missing or unparsable values fall back to the
/// defaults; out-of-range values are clamped.
pub fn queue_config_from_env() -> QueueConfig {
    let retry_defaults = RetryConfig::default();

    let max_video_concurrency =
        env_u64("LANEFLOW_MAX_VIDEO_JOBS", Some("MAX_CONCURRENT_VIDEO_JOBS"), 2).clamp(1, 64);
    let max_qa_concurrency =
        env_u64("LANEFLOW_MAX_QA_JOBS", Some("MAX_CONCURRENT_QA_JOBS"), 10).clamp(1, 256);

    let job_timeout_ms =
        env_u64("LANEFLOW_JOB_TIMEOUT_MS", Some("JOB_TIMEOUT"), 300_000).clamp(100, 6 * 60 * 60 * 1000);

    let max_attempts =
        env_u64("LANEFLOW_RETRY_ATTEMPTS", Some("JOB_RETRY_ATTEMPTS"), 3).clamp(1, 25) as u32;
    let base_delay_ms = env_u64("LANEFLOW_RETRY_DELAY_MS", Some("JOB_RETRY_DELAY"), 2000);
    let max_delay_ms = env_u64("LANEFLOW_RETRY_MAX_DELAY_MS", None, 900_000).max(base_delay_ms);
    let jitter_pct = env_or_fallback("LANEFLOW_RETRY_JITTER_PCT", "RETRY_JITTER_PCT")
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(retry_defaults.jitter_pct)
        .clamp(0.0, 1.0);

    let poll_interval_ms = env_u64("LANEFLOW_POLL_INTERVAL_MS", None, 1000).clamp(10, 60_000);

    let history_limit = env_u64("LANEFLOW_HISTORY_LIMIT", None, 1000).clamp(1, 1_000_000) as usize;
    let history_ttl_secs = env_u64("LANEFLOW_HISTORY_TTL_SECS", None, 24 * 60 * 60);

    let event_capacity = env_u64("LANEFLOW_EVENT_CAPACITY", None, 1024).clamp(16, 65_536) as usize;

    QueueConfig {
        max_video_concurrency: max_video_concurrency as usize,
        max_qa_concurrency: max_qa_concurrency as usize,
        job_timeout: Duration::from_millis(job_timeout_ms),
        retry: RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter_pct,
        },
        poll_interval: Duration::from_millis(poll_interval_ms),
        retention: RetentionPolicy {
            max_jobs: history_limit,
            ttl: (history_ttl_secs > 0).then(|| Duration::from_secs(history_ttl_secs)),
        },
        event_capacity,
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_u64(primary: &str, fallback: Option<&str>, default: u64) -> u64 {
    let raw = match fallback {
        Some(fallback) => env_or_fallback(primary, fallback),
        None => std::env::var(primary).ok(),
    };
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}
