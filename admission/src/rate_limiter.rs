use crate::metrics_defs::{ADMISSION_ALLOWED, ADMISSION_REJECTED};
use parking_lot::{Mutex, RwLock};
use shared::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: u32 = 20;
const DEFAULT_TOKENS_PER_REFILL: u32 = 20;
const DEFAULT_REFILL_DURATION_SECS: u64 = 1;

/// Metadata key on a [`Decision`] carrying the tokens left in the bucket.
pub const REMAINING_TOKENS_KEY: &str = "x-ratelimit-remaining";

/// Immutable parameter snapshot shared by every bucket.
///
/// Replaced wholesale by [`RateLimiter::set_parameters`]; bucket logic reads
/// exactly one snapshot per call and never sees partially updated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub capacity: u32,
    pub tokens_per_refill: u32,
    pub refill_duration: Duration,
}

/// Outcome of one admission check.
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// A new bucket starts full.
    fn new(config: &RateLimiterConfig, now: Instant) -> Self {
        TokenBucket {
            tokens: config.capacity,
            last_refill: now,
        }
    }

    /// Refill once when a full interval has elapsed, then take one token if
    /// available. One refill per check, regardless of how many intervals
    /// passed; the cap keeps the count at or below capacity.
    fn try_acquire(&mut self, config: &RateLimiterConfig, now: Instant) -> bool {
        if now.duration_since(self.last_refill) >= config.refill_duration {
            self.tokens = self
                .tokens
                .saturating_add(config.tokens_per_refill)
                .min(config.capacity);
            self.last_refill = now;
        }

        if self.tokens >= 1 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

type BucketKey = (String, String);

/// Token-bucket admission controller with one lazily created bucket per
/// (route id, client key) pair.
///
/// The bucket map lock is held only to look up or insert a bucket; the
/// check-and-decrement runs under the bucket's own mutex, so concurrent
/// callers on the same key serialize while disjoint keys proceed
/// independently. Buckets are never evicted; callers must keep the key
/// space bounded.
pub struct RateLimiter {
    config: RwLock<Arc<RateLimiterConfig>>,
    buckets: RwLock<HashMap<BucketKey, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, tokens_per_refill: u32, refill_duration: Duration) -> Self {
        RateLimiter {
            config: RwLock::new(Arc::new(RateLimiterConfig {
                capacity,
                tokens_per_refill,
                refill_duration,
            })),
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Decide whether one request for `(route_id, client_key)` may pass.
    ///
    /// Never blocks on I/O and never suspends; the decision reflects the
    /// bucket state at the time of the call.
    pub fn is_allowed(&self, route_id: &str, client_key: &str) -> Decision {
        self.check(route_id, client_key, Instant::now())
    }

    fn check(&self, route_id: &str, client_key: &str, now: Instant) -> Decision {
        let config = self.config_snapshot();
        let bucket = self.bucket(route_id, client_key, &config, now);

        let (allowed, remaining) = {
            let mut bucket = bucket.lock();
            let allowed = bucket.try_acquire(&config, now);
            (allowed, bucket.tokens)
        };

        if allowed {
            counter!(ADMISSION_ALLOWED).increment(1);
        } else {
            counter!(ADMISSION_REJECTED).increment(1);
            tracing::debug!(route_id, "request rejected by rate limiter");
        }

        Decision {
            allowed,
            metadata: HashMap::from([(
                REMAINING_TOKENS_KEY.to_string(),
                remaining.to_string(),
            )]),
        }
    }

    /// Replace the shared parameters.
    ///
    /// `capacity` is always overwritten. A zero `tokens_per_refill` or
    /// `refill_duration_secs` means "no change requested", not "set to
    /// zero". Existing buckets keep their current token counts; the new
    /// capacity only caps them at the next refill.
    pub fn set_parameters(&self, capacity: u32, tokens_per_refill: u32, refill_duration_secs: u64) {
        let mut guard = self.config.write();
        let current = **guard;
        *guard = Arc::new(RateLimiterConfig {
            capacity,
            tokens_per_refill: if tokens_per_refill != 0 {
                tokens_per_refill
            } else {
                current.tokens_per_refill
            },
            refill_duration: if refill_duration_secs != 0 {
                Duration::from_secs(refill_duration_secs)
            } else {
                current.refill_duration
            },
        });
    }

    /// Snapshot of the current parameters, for callers rebuilding derived
    /// configuration.
    pub fn new_config(&self) -> RateLimiterConfig {
        **self.config.read()
    }

    fn config_snapshot(&self) -> Arc<RateLimiterConfig> {
        self.config.read().clone()
    }

    fn bucket(
        &self,
        route_id: &str,
        client_key: &str,
        config: &RateLimiterConfig,
        now: Instant,
    ) -> Arc<Mutex<TokenBucket>> {
        let key = (route_id.to_string(), client_key.to_string());
        if let Some(bucket) = self.buckets.read().get(&key) {
            return bucket.clone();
        }

        self.buckets
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(config, now))))
            .clone()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_CAPACITY,
            DEFAULT_TOKENS_PER_REFILL,
            Duration::from_secs(DEFAULT_REFILL_DURATION_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE: &str = "testRoute";
    const USER: &str = "testUser";

    fn limiter() -> RateLimiter {
        RateLimiter::new(3, 3, Duration::from_secs(1))
    }

    #[test]
    fn allows_while_tokens_are_available() {
        let limiter = limiter();
        assert!(limiter.is_allowed(ROUTE, USER).allowed);
    }

    #[test]
    fn denies_once_tokens_are_exhausted() {
        let limiter = limiter();
        for i in 0..3 {
            assert!(
                limiter.is_allowed(ROUTE, USER).allowed,
                "request {} should be allowed",
                i + 1
            );
        }
        assert!(!limiter.is_allowed(ROUTE, USER).allowed);
    }

    #[test]
    fn different_client_keys_have_separate_buckets() {
        let limiter = limiter();
        for _ in 0..3 {
            assert!(limiter.is_allowed(ROUTE, "client1").allowed);
        }
        assert!(!limiter.is_allowed(ROUTE, "client1").allowed);
        assert!(limiter.is_allowed(ROUTE, "client2").allowed);
    }

    #[test]
    fn different_routes_have_separate_buckets() {
        let limiter = limiter();
        for _ in 0..3 {
            assert!(limiter.is_allowed("routeA", USER).allowed);
        }
        assert!(!limiter.is_allowed("routeA", USER).allowed);
        assert!(limiter.is_allowed("routeB", USER).allowed);
    }

    #[test]
    fn decision_reports_remaining_tokens() {
        let limiter = limiter();
        let decision = limiter.is_allowed(ROUTE, USER);
        assert_eq!(
            decision.metadata.get(REMAINING_TOKENS_KEY).map(String::as_str),
            Some("2")
        );
    }

    #[test]
    fn a_full_interval_refills_up_to_capacity() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check(ROUTE, USER, start).allowed);
        }
        assert!(!limiter.check(ROUTE, USER, start).allowed);

        // One interval later a full refill lands, capped at capacity.
        let later = start + Duration::from_secs(1);
        assert!(limiter.check(ROUTE, USER, later).allowed);
        assert!(limiter.check(ROUTE, USER, later).allowed);
        assert!(limiter.check(ROUTE, USER, later).allowed);
        assert!(!limiter.check(ROUTE, USER, later).allowed);
    }

    #[test]
    fn no_refill_before_the_interval_elapses() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check(ROUTE, USER, start).allowed);
        }
        let early = start + Duration::from_millis(900);
        assert!(!limiter.check(ROUTE, USER, early).allowed);
    }

    #[test]
    fn refill_never_exceeds_capacity_after_a_long_idle() {
        let limiter = limiter();
        let start = Instant::now();
        assert!(limiter.check(ROUTE, USER, start).allowed);

        // Ten idle intervals still refill once, capped at capacity.
        let much_later = start + Duration::from_secs(10);
        for _ in 0..3 {
            assert!(limiter.check(ROUTE, USER, much_later).allowed);
        }
        assert!(!limiter.check(ROUTE, USER, much_later).allowed);
    }

    #[test]
    fn set_parameters_overrides_all_non_zero_values() {
        let limiter = limiter();
        limiter.set_parameters(20, 10, 2);

        let config = limiter.new_config();
        assert_eq!(config.capacity, 20);
        assert_eq!(config.tokens_per_refill, 10);
        assert_eq!(config.refill_duration, Duration::from_secs(2));
    }

    #[test]
    fn set_parameters_treats_zero_as_no_change() {
        let limiter = limiter();
        limiter.set_parameters(30, 0, 0);

        let config = limiter.new_config();
        assert_eq!(config.capacity, 30);
        assert_eq!(config.tokens_per_refill, 3);
        assert_eq!(config.refill_duration, Duration::from_secs(1));
    }

    #[test]
    fn new_config_snapshots_current_parameters() {
        let limiter = limiter();
        let config = limiter.new_config();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.tokens_per_refill, 3);
        assert_eq!(config.refill_duration, Duration::from_secs(1));
    }

    #[test]
    fn concurrent_callers_never_share_a_token() {
        let limiter = Arc::new(RateLimiter::new(10, 10, Duration::from_secs(60)));
        let allowed = Arc::new(std::sync::atomic::AtomicU32::new(0));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let limiter = limiter.clone();
                let allowed = allowed.clone();
                scope.spawn(move || {
                    for _ in 0..5 {
                        if limiter.is_allowed(ROUTE, USER).allowed {
                            allowed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        // 40 attempts against a capacity of 10 with no refill in reach:
        // exactly the capacity may pass.
        assert_eq!(allowed.load(std::sync::atomic::Ordering::Relaxed), 10);
    }
}
