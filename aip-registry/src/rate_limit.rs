//! Fixed-window rate limiting keyed by caller address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::store::{RegistryError, RegistryResult};

/// Budget for a single caller within one window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    limit: u32,
    window: Duration,
}

impl RateLimitConfig {
    /// Creates a configuration allowing `limit` requests per `window`.
    #[must_use]
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Returns the per-window request budget.
    #[must_use]
    pub const fn limit(self) -> u32 {
        self.limit
    }

    /// Returns the window length.
    #[must_use]
    pub const fn window(self) -> Duration {
        self.window
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description when the limit is zero or the window is empty.
    pub fn validate(self) -> Result<(), &'static str> {
        if self.limit == 0 {
            return Err("rate limit must be greater than zero");
        }
        if self.window.is_zero() {
            return Err("rate limit window must be greater than zero");
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 100 requests per 60 second window, matching the protocol default.
        Self::new(100, Duration::from_secs(60))
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter per caller IP.
///
/// The first request of a window resets the caller's counter to 1; once the
/// counter exceeds the budget, every further request in the window is rejected
/// with the whole seconds remaining until reset.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl FixedWindowLimiter {
    /// Creates a limiter with the supplied configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<IpAddr, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a request from `source` and checks it against the budget.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RateLimited`] once the caller exceeds the
    /// window budget.
    pub fn check(&self, source: IpAddr) -> RegistryResult<()> {
        self.check_at(source, Instant::now())
    }

    /// Clock-injectable variant of [`check`](Self::check).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RateLimited`] once the caller exceeds the
    /// window budget.
    pub fn check_at(&self, source: IpAddr, now: Instant) -> RegistryResult<()> {
        let mut windows = self.windows();
        let window = windows.entry(source).or_insert_with(|| Window {
            count: 0,
            reset_at: now + self.config.window(),
        });
        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.config.window();
        }
        window.count += 1;

        if window.count > self.config.limit() {
            let remaining = window.reset_at.saturating_duration_since(now);
            // Ceiling in whole seconds so "retry after" never understates.
            let retry_after =
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(RegistryError::RateLimited { retry_after });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn source() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn allows_up_to_the_budget() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig::default());
        let now = Instant::now();
        for _ in 0..100 {
            limiter.check_at(source(), now).unwrap();
        }
        let err = limiter.check_at(source(), now).unwrap_err();
        match err {
            RegistryError::RateLimited { retry_after } => assert!(retry_after <= 60),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn window_elapse_resets_the_counter() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig::new(2, Duration::from_secs(60)));
        let start = Instant::now();
        limiter.check_at(source(), start).unwrap();
        limiter.check_at(source(), start).unwrap();
        assert!(limiter.check_at(source(), start).is_err());

        let later = start + Duration::from_secs(61);
        limiter.check_at(source(), later).unwrap();
    }

    #[test]
    fn sources_are_tracked_independently() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig::new(1, Duration::from_secs(60)));
        let now = Instant::now();
        limiter.check_at(source(), now).unwrap();
        assert!(limiter.check_at(source(), now).is_err());
        limiter
            .check_at(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), now)
            .unwrap();
    }

    #[test]
    fn retry_after_reports_remaining_seconds() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig::new(1, Duration::from_secs(60)));
        let start = Instant::now();
        limiter.check_at(source(), start).unwrap();
        let err = limiter
            .check_at(source(), start + Duration::from_secs(30))
            .unwrap_err();
        match err {
            RegistryError::RateLimited { retry_after } => assert_eq!(retry_after, 30),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_validation() {
        assert!(RateLimitConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(RateLimitConfig::new(1, Duration::ZERO).validate().is_err());
        assert!(RateLimitConfig::default().validate().is_ok());
    }
}
