//! A proactive, quota-aware rate limiter for remote API clients.
//!
//! Stalls calls before quota exhaustion rather than reacting to a 429 after
//! the fact. Generalized from any one backend via the [`RateLimiterBackend`]
//! trait — the wire format of the actual remote call is out of scope for
//! this crate.

mod error;
mod limiter;

pub use error::ClientError;
pub use limiter::{QuotaSnapshot, RateLimiter, RateLimiterBackend};
