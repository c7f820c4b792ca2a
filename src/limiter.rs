//! Token-bucket admission control.
//!
//! A single [`TokenBucket`] guards the whole process. Tokens refill
//! continuously at `refill_rate` per second up to `capacity`; every admitted
//! call consumes one token. Rejected calls leave the balance untouched so
//! fractional tokens keep accumulating toward the next admission.
//!
//! ```text
//!   tokens
//!     ▲
//!  C ─┤■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■■  ← capped at capacity
//!     │       ╱│      ╱│
//!     │     ╱  │    ╱  │   refill: elapsed × refill_rate
//!     │   ╱    │  ╱    │
//!     │ ╱      │╱      │   allow(): −1 when tokens ≥ 1
//!     └─────────────────────────────────► time
//! ```
//!
//! Refill is computed lazily inside [`TokenBucket::allow`], so the bucket has
//! no background task. The time source is injected through [`Clock`], which
//! lets tests drive the bucket with a [`ManualClock`].

use std::fmt;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

/// Source of "now" for the limiter.
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Monotonic wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the limiter and keep another to advance time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Move the clock backward by `by`, simulating a non-monotonic source.
    ///
    /// Left unchanged if the result would precede the platform's earliest instant.
    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(earlier) = now.checked_sub(by) {
            *now = earlier;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Error type for limiter construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("refill rate must be greater than 0")]
    ZeroRate,
    #[error("burst capacity must be greater than 0")]
    ZeroCapacity,
}

/// Mutable part of the bucket, always accessed under one lock.
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Process-wide token bucket.
///
/// `allow()` is synchronous and never waits: it reports whether a token is
/// available right now. The read-refill-decide-decrement sequence runs as a
/// single critical section, so concurrent callers can never both spend the
/// same last token.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
    clock: Box<dyn Clock>,
}

impl fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .field("available_tokens", &self.available_tokens())
            .finish()
    }
}

impl TokenBucket {
    /// Create a full bucket driven by the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] if either parameter is zero.
    pub fn new(refill_rate: u32, capacity: u32) -> Result<Self, RateLimitError> {
        Self::with_clock(refill_rate, capacity, SystemClock)
    }

    /// Create a full bucket driven by the given clock.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] if either parameter is zero.
    pub fn with_clock(
        refill_rate: u32,
        capacity: u32,
        clock: impl Clock,
    ) -> Result<Self, RateLimitError> {
        let refill_rate = NonZeroU32::new(refill_rate).ok_or(RateLimitError::ZeroRate)?;
        let capacity = NonZeroU32::new(capacity).ok_or(RateLimitError::ZeroCapacity)?;
        let capacity = f64::from(capacity.get());

        let state = BucketState {
            tokens: capacity,
            last_refill: clock.now(),
        };

        Ok(Self {
            capacity,
            refill_rate: f64::from(refill_rate.get()),
            state: Mutex::new(state),
            clock: Box::new(clock),
        })
    }

    /// Try to take one token.
    ///
    /// Returns `true` when the call is admitted.
    pub fn allow(&self) -> bool {
        // The state is never left half-updated, so a poisoned lock is still consistent.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.clock.now();
        // Clock skew must never drain tokens.
        let elapsed = now.saturating_duration_since(state.last_refill);

        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return true;
        }

        warn!(
            tokens = state.tokens,
            capacity = self.capacity,
            "Rate limit exceeded"
        );
        false
    }

    /// Tokens currently in the bucket, as of the last refill computation.
    pub fn available_tokens(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }

    /// Maximum burst size.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bucket(rate: u32, capacity: u32) -> (TokenBucket, ManualClock) {
        let clock = ManualClock::new();
        let bucket = TokenBucket::with_clock(rate, capacity, clock.clone()).unwrap();
        (bucket, clock)
    }

    #[test]
    fn test_zero_parameters_rejected() {
        assert_eq!(
            TokenBucket::new(0, 10).unwrap_err(),
            RateLimitError::ZeroRate
        );
        assert_eq!(
            TokenBucket::new(10, 0).unwrap_err(),
            RateLimitError::ZeroCapacity
        );
    }

    #[test]
    fn test_starts_full() {
        let (bucket, _clock) = bucket(2, 5);
        assert_eq!(bucket.available_tokens(), 5.0);
        assert_eq!(bucket.capacity(), 5.0);
        assert_eq!(bucket.refill_rate(), 2.0);
    }

    #[test]
    fn test_burst_then_drain() {
        let (bucket, clock) = bucket(2, 3);

        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());

        clock.advance(Duration::from_secs(1));

        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_admits_exactly_capacity_without_elapsed_time() {
        for capacity in [1, 4, 10, 50] {
            let (bucket, _clock) = bucket(7, capacity);
            let admitted = (0..capacity * 3).filter(|_| bucket.allow()).count();
            assert_eq!(admitted, capacity as usize);
        }
    }

    #[test]
    fn test_one_admission_per_refill_interval() {
        let (bucket, clock) = bucket(4, 1);
        assert!(bucket.allow());
        assert!(!bucket.allow());

        // Just short of 1/R: still rejected, fraction accumulates.
        clock.advance(Duration::from_millis(200));
        assert!(!bucket.allow());

        clock.advance(Duration::from_millis(100));
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_rejection_keeps_fractional_tokens() {
        let (bucket, clock) = bucket(1, 1);
        assert!(bucket.allow());

        clock.advance(Duration::from_millis(500));
        assert!(!bucket.allow());
        assert!((bucket.available_tokens() - 0.5).abs() < 1e-9);

        clock.advance(Duration::from_millis(500));
        assert!(bucket.allow());
    }

    #[test]
    fn test_never_exceeds_capacity_after_long_idle() {
        let (bucket, clock) = bucket(100, 3);
        assert!(bucket.allow());

        clock.advance(Duration::from_secs(60 * 60 * 24));
        assert!(bucket.allow());
        // Refilled to 3, then one taken.
        assert_eq!(bucket.available_tokens(), 2.0);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_clock_moving_backwards_does_not_drain_tokens() {
        let (bucket, clock) = bucket(1, 2);
        assert!(bucket.allow());
        let before = bucket.available_tokens();

        clock.rewind(Duration::from_secs(5));
        assert!(bucket.allow());
        assert_eq!(bucket.available_tokens(), before - 1.0);
    }

    #[test]
    fn test_capacity_equal_to_rate_is_steady_state() {
        let (bucket, clock) = bucket(5, 5);
        let admitted = (0..20).filter(|_| bucket.allow()).count();
        assert_eq!(admitted, 5);

        clock.advance(Duration::from_millis(200));
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_concurrent_callers_never_over_admit() {
        const CALLERS: usize = 64;
        const TOKENS: u32 = 17;

        let (bucket, _clock) = bucket(1, TOKENS);
        let barrier = Barrier::new(CALLERS);
        let admitted = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..CALLERS {
                s.spawn(|| {
                    barrier.wait();
                    if bucket.allow() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), TOKENS as usize);
        assert!(bucket.available_tokens() < 1.0);
    }

    #[test]
    fn test_system_clock_bucket_admits_burst() {
        let bucket = TokenBucket::new(1, 2).unwrap();
        assert!(bucket.allow());
        assert!(bucket.allow());
    }
}
