//! Process-wide circuit breaker over the downstream message handler.
//!
//! One breaker per transport instance: a downstream outage affects every
//! client uniformly. The breaker protects the shared handler, not per-client
//! fairness, so it deliberately ignores 4xx-class request errors.

use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// Cooldown after the last failure before a trial request is admitted.
    pub reset_timeout: Duration,
    /// Trial requests admitted while half-open.
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_requests: 1,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    half_open_trials: u32,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: CircuitState::Closed,
            failures: 0,
            last_failure: None,
            half_open_trials: 0,
        }
    }

    /// Current mode, without transition side effects (for health reporting).
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Decide whether a request may proceed.
    ///
    /// Checking an open breaker whose cooldown has elapsed transitions it to
    /// half-open as a side effect.
    pub fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = self
                    .last_failure
                    .is_some_and(|at| at.elapsed() >= self.cfg.reset_timeout);
                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_trials = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.half_open_trials < self.cfg.half_open_requests,
        }
    }

    /// A request completed: force closed and reset all counters.
    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.failures = 0;
        self.half_open_trials = 0;
    }

    /// A request failed downstream: count it and trip open at the threshold.
    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure = Some(Instant::now());
        if self.state == CircuitState::HalfOpen {
            self.half_open_trials += 1;
        }
        if self.failures >= self.cfg.failure_threshold {
            self.state = CircuitState::Open;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
            half_open_requests: 1,
        })
    }

    #[test]
    fn exactly_threshold_failures_trip_open() {
        let mut b = breaker(3, Duration::from_secs(30));
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.can_execute());

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.can_execute());
    }

    #[test]
    fn cooldown_elapse_admits_a_half_open_trial() {
        let mut b = breaker(1, Duration::from_millis(20));
        b.record_failure();
        assert!(!b.can_execute());

        std::thread::sleep(Duration::from_millis(40));
        assert!(b.can_execute());
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_closes_and_resets() {
        let mut b = breaker(2, Duration::from_millis(10));
        b.record_failure();
        b.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(b.can_execute());

        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);

        // Counter was reset: one failure alone must not re-open.
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_with_fresh_cooldown() {
        let mut b = breaker(1, Duration::from_millis(20));
        b.record_failure();
        std::thread::sleep(Duration::from_millis(40));
        assert!(b.can_execute());
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
        // The failure timestamp was refreshed, so the breaker stays open.
        assert!(!b.can_execute());
    }

    #[test]
    fn half_open_admits_a_bounded_number_of_trials() {
        let mut b = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(10),
            half_open_requests: 2,
        });
        b.record_failure();
        std::thread::sleep(Duration::from_millis(30));

        assert!(b.can_execute());
        assert!(b.can_execute());
        b.record_failure();
        // Back to open: no more trials.
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.can_execute());
    }
}
