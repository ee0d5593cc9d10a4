//! Per-key admission control for the gateway request path.
//!
//! A token bucket is kept per routing key (route id + client identity) and
//! consulted synchronously on every request. Buckets are independent:
//! contention on one key never delays decisions for another.

pub mod metrics_defs;
mod rate_limiter;

pub use rate_limiter::{Decision, RateLimiter, RateLimiterConfig};
