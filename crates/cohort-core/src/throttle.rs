use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use std::time::Duration;

type KeyedLimiter<C> =
    RateLimiter<i64, DashMapStateStore<i64>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Per-user minimum interval between accepted sends, regardless of group.
/// One message per interval, no burst allowance. A zero interval disables
/// throttling.
pub struct SendThrottle<C: Clock = DefaultClock> {
    limiter: Option<KeyedLimiter<C>>,
    clock: C,
}

impl SendThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, DefaultClock::default())
    }
}

impl<C: Clock> SendThrottle<C> {
    pub fn with_clock(min_interval: Duration, clock: C) -> Self {
        let limiter =
            Quota::with_period(min_interval).map(|quota| RateLimiter::dashmap_with_clock(quota, &clock));
        Self { limiter, clock }
    }

    /// Accept and record a send, or return how long the caller must wait.
    /// Rejected attempts leave the window untouched.
    pub fn try_acquire(&self, user_id: i64) -> Result<(), Duration> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter
            .check_key(&user_id)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drop entries that can no longer throttle anyone. Returns how many
    /// were removed.
    pub fn prune(&self) -> usize {
        let Some(limiter) = &self.limiter else {
            return 0;
        };
        let before = limiter.len();
        limiter.retain_recent();
        limiter.shrink_to_fit();
        before.saturating_sub(limiter.len())
    }

    pub fn tracked_users(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }
}
