use std::time::Duration;

use rand::Rng;

use crate::jobs::error_codes::{ErrorCode, JobError};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total executions allowed before a retryable failure becomes terminal.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_pct: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15 * 60),
            jitter_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

pub fn classify_error(code: ErrorCode) -> ErrorClass {
    match code {
        ErrorCode::Persistence
        | ErrorCode::DependencyDown
        | ErrorCode::BadResponse
        | ErrorCode::NotFound => ErrorClass::NonRetryable,
        ErrorCode::Timeout | ErrorCode::Unknown => ErrorClass::Retryable,
    }
}

/// `base * 2^(attempt_no-1)`, capped at `max_delay`, with optional jitter.
pub fn next_delay(attempt_no: u32, cfg: &RetryConfig, rng: &mut impl Rng) -> Duration {
    let exp = attempt_no.max(1).saturating_sub(1);

    // 2^exp; anything that overflows is left to the cap.
    let pow2 = 1_u64.checked_shl(exp).unwrap_or(u64::MAX);

    let base_ms = cfg.base_delay.as_millis().min(u64::MAX as u128) as u64;
    let max_ms = cfg.max_delay.as_millis().min(u64::MAX as u128) as u64;

    let delay_ms = base_ms.saturating_mul(pow2).min(max_ms);

    if cfg.jitter_pct <= 0.0 {
        return Duration::from_millis(delay_ms);
    }

    // jitter in range [-jitter_pct, +jitter_pct]
    let jitter_range = (delay_ms as f64) * cfg.jitter_pct;
    let jitter = rng.gen_range(-jitter_range..=jitter_range);
    let jittered = (delay_ms as f64 + jitter).round().clamp(0.0, max_ms as f64);

    Duration::from_millis(jittered as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    NonRetryable,
    MaxAttemptsExceeded,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::NonRetryable => "NON_RETRYABLE",
            FailReason::MaxAttemptsExceeded => "MAX_ATTEMPTS_EXCEEDED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Fail(FailReason),
}

/// `attempts` is the failure count including the one being decided.
pub fn decide(
    attempts: u32,
    err: &JobError,
    cfg: &RetryConfig,
    rng: &mut impl Rng,
) -> RetryDecision {
    if classify_error(err.code()) == ErrorClass::NonRetryable {
        return RetryDecision::Fail(FailReason::NonRetryable);
    }

    if attempts < cfg.max_attempts {
        RetryDecision::RetryAfter(next_delay(attempts, cfg, rng))
    } else {
        RetryDecision::Fail(FailReason::MaxAttemptsExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn cfg(base_ms: u64, max_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            jitter_pct: 0.0,
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let cfg = cfg(1000, 60_000);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(next_delay(1, &cfg, &mut rng), Duration::from_millis(1000));
        assert_eq!(next_delay(2, &cfg, &mut rng), Duration::from_millis(2000));
        assert_eq!(next_delay(3, &cfg, &mut rng), Duration::from_millis(4000));
    }

    #[test]
    fn delay_is_capped_even_for_huge_attempt_numbers() {
        let cfg = cfg(1000, 5000);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(next_delay(4, &cfg, &mut rng), Duration::from_millis(5000));
        assert_eq!(next_delay(200, &cfg, &mut rng), Duration::from_millis(5000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut cfg = cfg(1000, 60_000);
        cfg.jitter_pct = 0.2;
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let d = next_delay(2, &cfg, &mut rng).as_millis();
            assert!((1600..=2400).contains(&d), "delay {d} out of jitter range");
        }
    }

    #[test]
    fn non_retryable_codes_fail_immediately() {
        let cfg = cfg(10, 100);
        let mut rng = StdRng::seed_from_u64(1);

        for err in [
            JobError::persistence("insert failed"),
            JobError::unavailable("503"),
            JobError::malformed("missing field"),
            JobError::not_found("company"),
        ] {
            assert_eq!(
                decide(1, &err, &cfg, &mut rng),
                RetryDecision::Fail(FailReason::NonRetryable)
            );
        }
    }

    #[test]
    fn retryable_errors_stop_at_the_limit() {
        let cfg = cfg(10, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let err = JobError::TimedOut { after_ms: 5 };

        assert_eq!(
            decide(4, &err, &cfg, &mut rng),
            RetryDecision::RetryAfter(Duration::from_millis(80))
        );
        assert_eq!(
            decide(5, &err, &cfg, &mut rng),
            RetryDecision::Fail(FailReason::MaxAttemptsExceeded)
        );
    }
}
