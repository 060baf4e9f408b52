//! Per-session sliding-window request admission.
//!
//! A sliding window (rather than fixed buckets) avoids burst-at-boundary
//! admission; keying by session isolates noisy clients from each other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    windows: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            windows: HashMap::new(),
        }
    }

    /// Admit or deny one request for `session_id`.
    ///
    /// Denied attempts are not recorded, so a throttled client does not push
    /// its own window further into the future.
    pub fn is_allowed(&mut self, session_id: &str) -> bool {
        let now = Instant::now();
        let window_start = now.checked_sub(self.window);
        let timestamps = self.windows.entry(session_id.to_string()).or_default();

        timestamps.retain(|t| match window_start {
            Some(start) => *t > start,
            // The process is younger than the window; keep everything.
            None => true,
        });

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Re-filter every window and drop entries for idle or departed sessions.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        let window_start = now.checked_sub(self.window);
        self.windows.retain(|_, timestamps| {
            timestamps.retain(|t| match window_start {
                Some(start) => *t > start,
                None => true,
            });
            !timestamps.is_empty()
        });
    }

    /// Number of sessions currently tracked.
    pub fn tracked_sessions(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_ceiling_then_denies() {
        let mut limiter = RateLimiter::new(Duration::from_secs(60), 3);
        assert!(limiter.is_allowed("s1"));
        assert!(limiter.is_allowed("s1"));
        assert!(limiter.is_allowed("s1"));
        assert!(!limiter.is_allowed("s1"));
        assert!(!limiter.is_allowed("s1"));
    }

    #[test]
    fn sessions_are_isolated() {
        let mut limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.is_allowed("a"));
        assert!(!limiter.is_allowed("a"));
        assert!(limiter.is_allowed("b"));
    }

    #[test]
    fn window_elapse_resets_admission() {
        let mut limiter = RateLimiter::new(Duration::from_millis(20), 2);
        assert!(limiter.is_allowed("s"));
        assert!(limiter.is_allowed("s"));
        assert!(!limiter.is_allowed("s"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.is_allowed("s"));
    }

    #[test]
    fn denied_attempts_are_not_recorded() {
        let mut limiter = RateLimiter::new(Duration::from_millis(30), 1);
        assert!(limiter.is_allowed("s"));
        // Hammering while throttled must not extend the window.
        for _ in 0..5 {
            assert!(!limiter.is_allowed("s"));
        }
        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.is_allowed("s"));
    }

    #[test]
    fn cleanup_drops_empty_windows() {
        let mut limiter = RateLimiter::new(Duration::from_millis(10), 5);
        assert!(limiter.is_allowed("gone"));
        assert_eq!(limiter.tracked_sessions(), 1);

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup();
        assert_eq!(limiter.tracked_sessions(), 0);
    }
}
