//! Errors surfaced by a [`crate::RateLimiterBackend`].

/// Failure to reach or parse a remote quota endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend's quota check failed; [`crate::RateLimiter`] falls back
    /// to conservative defaults rather than propagating this.
    #[error("quota check failed: {0}")]
    QuotaCheckFailed(String),
}
