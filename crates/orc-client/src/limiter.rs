use crate::error::ClientError;
use async_trait::async_trait;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Default fallback assumed when a quota check fails: an unreachable backend
/// is treated as "probably fine, but be cautious" rather than "unlimited".
const CONSERVATIVE_REMAINING: u64 = 1000;
const CONSERVATIVE_LIMIT: u64 = 5000;
const CONSERVATIVE_RESET_IN_SECS: f64 = 3600.0;

/// A point-in-time view of a remote API's request quota.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaSnapshot {
    pub remaining: u64,
    pub limit: u64,
    /// Unix timestamp (seconds) at which the quota window resets.
    pub reset_at: f64,
    /// Seconds remaining until reset, as observed at fetch time.
    pub reset_in: f64,
}

impl QuotaSnapshot {
    fn conservative_default() -> Self {
        let now = unix_now();
        Self {
            remaining: CONSERVATIVE_REMAINING,
            limit: CONSERVATIVE_LIMIT,
            reset_at: now + CONSERVATIVE_RESET_IN_SECS,
            reset_in: CONSERVATIVE_RESET_IN_SECS,
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// The contract a real remote client (GitHub, an LLM provider, ...)
/// implements to plug into [`RateLimiter`]. The wire format of the quota
/// call itself is out of scope here — only the shape of the answer matters.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    async fn fetch_quota(&self) -> Result<QuotaSnapshot, ClientError>;
}

struct CacheState {
    cached: Option<QuotaSnapshot>,
    last_check: Option<Instant>,
}

/// Serializes quota checks and waits behind a single async mutex so that a
/// caller which just finished waiting always observes the refreshed quota,
/// and concurrent callers are served in FIFO order.
pub struct RateLimiter<B: RateLimiterBackend> {
    backend: B,
    safety_margin: u64,
    check_interval: Duration,
    state: Mutex<CacheState>,
}

impl<B: RateLimiterBackend> RateLimiter<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, 100, Duration::from_secs(60))
    }

    #[must_use]
    pub fn with_config(backend: B, safety_margin: u64, check_interval: Duration) -> Self {
        Self {
            backend,
            safety_margin,
            check_interval,
            state: Mutex::new(CacheState {
                cached: None,
                last_check: None,
            }),
        }
    }

    /// Cached quota if fresh, otherwise a refreshed read through the
    /// backend. A failed refresh falls back to conservative defaults
    /// without poisoning the cache, so the next call retries promptly.
    pub async fn check(&self) -> QuotaSnapshot {
        let mut guard = self.state.lock().await;
        self.refresh_if_stale(&mut guard).await
    }

    /// Block until it is safe to spend `estimated_cost` units of quota.
    ///
    /// Holds the state lock across both the refresh and the sleep so that
    /// concurrent callers queue rather than all waiting in parallel and
    /// stampeding the backend the instant it resets.
    pub async fn wait_if_needed(&self, estimated_cost: u64) {
        let mut guard = self.state.lock().await;
        let snapshot = self.refresh_if_stale(&mut guard).await;

        if snapshot.remaining <= estimated_cost + self.safety_margin {
            let wait_secs = (snapshot.reset_in + 1.0).max(0.0);
            tracing::info!(wait_secs, remaining = snapshot.remaining, "rate limit margin exhausted, waiting");
            tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
            self.refresh(&mut guard).await;
        }
    }

    async fn refresh_if_stale(&self, guard: &mut CacheState) -> QuotaSnapshot {
        if let (Some(cached), Some(last_check)) = (guard.cached, guard.last_check) {
            if last_check.elapsed() < self.check_interval {
                return cached;
            }
        }
        self.refresh(guard).await
    }

    async fn refresh(&self, guard: &mut CacheState) -> QuotaSnapshot {
        match self.backend.fetch_quota().await {
            Ok(snapshot) => {
                guard.cached = Some(snapshot);
                guard.last_check = Some(Instant::now());
                snapshot
            }
            Err(err) => {
                tracing::warn!(error = %err, "quota check failed, falling back to conservative defaults");
                QuotaSnapshot::conservative_default()
            }
        }
    }
}
