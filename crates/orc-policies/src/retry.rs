//! Retry policy: which errors are retryable, and how long to wait.
//!
//! Classification is layered: a structured [`ErrorKind`] is consulted
//! first, and only [`ErrorKind::Other`] falls back to a substring scan —
//! string matching is the compatibility path, not the primary one.

use orc_types::ErrorKind;
use serde::{Deserialize, Serialize};

/// The markers that count as a rate-limit signal, matched case-insensitively.
const RATE_LIMIT_MARKERS: [&str; 3] = ["429", "rate limit", "resource_exhausted"];

/// Whether `text` contains one of the rate-limit markers, case-insensitively.
#[must_use]
pub fn looks_like_rate_limit(text: &str) -> bool {
    let lower = text.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub exponential_base: f64,
    pub rate_limit_base_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_seconds: 5.0,
            max_delay_seconds: 120.0,
            exponential_base: 2.0,
            rate_limit_base_seconds: 60.0,
        }
    }
}

/// The outcome of consulting the retry policy about one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay_seconds: f64,
}

impl RetryPolicy {
    /// Delay for retry attempt `attempt` (0-indexed), given whether this was
    /// a rate-limit error.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, is_rate_limit: bool) -> f64 {
        if is_rate_limit {
            return self.rate_limit_base_seconds * f64::from(attempt + 1);
        }
        let delay = self.initial_delay_seconds * self.exponential_base.powi(attempt as i32);
        delay.min(self.max_delay_seconds)
    }

    /// Decide whether `attempt` should be retried and, if so, after how long.
    ///
    /// `kind` is the structured classification the worker/engine already
    /// computed; `message` is consulted only when `kind` is
    /// [`ErrorKind::Other`].
    #[must_use]
    pub fn decide(&self, attempt: u32, kind: ErrorKind, message: &str) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision {
                should_retry: false,
                delay_seconds: 0.0,
            };
        }

        // Structured check first; the substring scan over `message` is only
        // consulted when the structured kind gives no answer (`Other`).
        let is_rate_limit = match kind {
            ErrorKind::RateLimit => true,
            ErrorKind::Other => looks_like_rate_limit(message),
            _ => false,
        };
        if is_rate_limit {
            return RetryDecision {
                should_retry: true,
                delay_seconds: self.delay_for(attempt, true),
            };
        }

        let retryable = matches!(kind, ErrorKind::Transient | ErrorKind::Parsing);
        RetryDecision {
            should_retry: retryable,
            delay_seconds: if retryable {
                self.delay_for(attempt, false)
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_at_attempt_zero_is_initial_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, false), policy.initial_delay_seconds);
    }

    #[test]
    fn delay_never_exceeds_max() {
        let policy = RetryPolicy::default();
        for attempt in 0..50 {
            assert!(policy.delay_for(attempt, false) <= policy.max_delay_seconds);
        }
    }

    #[test]
    fn rate_limit_marker_detection_is_case_insensitive() {
        assert!(looks_like_rate_limit("HTTP 429 Too Many Requests"));
        assert!(looks_like_rate_limit("Rate Limit exceeded"));
        assert!(looks_like_rate_limit("RESOURCE_EXHAUSTED"));
        assert!(!looks_like_rate_limit("internal server error"));
    }

    #[test]
    fn hard_cap_stops_retries_regardless_of_kind() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..Default::default()
        };
        let decision = policy.decide(2, ErrorKind::RateLimit, "429");
        assert!(!decision.should_retry);
    }

    #[test]
    fn structured_kind_takes_precedence_over_message() {
        let policy = RetryPolicy::default();
        // Authentication is never retryable, even if the message happens to
        // mention a rate-limit marker incidentally — the structured kind
        // wins and the substring fallback is never consulted.
        let decision = policy.decide(0, ErrorKind::Authentication, "429 shouldn't matter here");
        assert!(!decision.should_retry);
    }

    #[test]
    fn other_error_falls_back_to_substring_scan() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(0, ErrorKind::Other, "got a 429 from upstream");
        assert!(decision.should_retry);
        let decision = policy.decide(0, ErrorKind::Other, "completely unrelated failure");
        assert!(!decision.should_retry);
    }
}
