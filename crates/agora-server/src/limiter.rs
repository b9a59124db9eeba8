//! Chat rate limiting: a token bucket per connection.

use std::time::Instant;

/// Token bucket guarding one connection's chat sends.
pub struct ChatLimiter {
    tokens: f64,
    capacity: u32,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl ChatLimiter {
    /// - `capacity`: max burst messages
    /// - `refill_per_sec`: steady-state rate (messages per second)
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            tokens: capacity as f64,
            capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Returns true if the message is allowed, false if rate-limited.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity as f64);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_limiter_allows_within_capacity() {
        let mut limiter = ChatLimiter::new(5, 1.0);
        for _ in 0..5 {
            assert!(limiter.allow(), "should allow up to capacity");
        }
    }

    #[test]
    fn test_limiter_blocks_over_capacity() {
        let mut limiter = ChatLimiter::new(3, 0.0); // refill=0 so no refill
        for _ in 0..3 {
            limiter.allow();
        }
        assert!(!limiter.allow(), "should block when over capacity");
    }

    #[test]
    fn test_limiter_refills_over_time() {
        let mut limiter = ChatLimiter::new(2, 1.0);
        limiter.allow();
        limiter.allow();
        assert!(!limiter.allow(), "bucket drained");

        // Backdate the refill clock instead of sleeping.
        limiter.last_refill -= Duration::from_secs(1);
        assert!(limiter.allow(), "one token refilled after a second");
        assert!(!limiter.allow(), "only one token refilled");
    }

    #[test]
    fn test_limiter_never_exceeds_capacity() {
        let mut limiter = ChatLimiter::new(2, 10.0);
        limiter.last_refill -= Duration::from_secs(60);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow(), "refill is clamped at capacity");
    }
}
