use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::ExtractError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls fail fast until the recovery window elapses.
    Open,
    /// One trial call decides between closing and reopening.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Consecutive-failure circuit breaker guarding the analysis engine.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Ask permission for one call. An open circuit whose recovery window
    /// has elapsed admits a single half-open trial.
    pub fn acquire(&self) -> Result<(), ExtractError> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(self.recovery, |at| at.elapsed());
                if elapsed >= self.recovery {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!("Analysis engine circuit half-open, probing");
                    Ok(())
                } else {
                    Err(ExtractError::CircuitOpen {
                        retry_in_ms: millis(self.recovery - elapsed),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(ExtractError::CircuitOpen { retry_in_ms: 0 })
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        if inner.state != CircuitState::Closed {
            info!("Analysis engine circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.trial_in_flight = false;
        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(
                failures = inner.consecutive_failures,
                recovery = ?self.recovery,
                "Analysis engine circuit opened"
            );
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.acquire().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(
            breaker.acquire(),
            Err(ExtractError::CircuitOpen { retry_in_ms }) if retry_in_ms > 0
        ));
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_trial_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.acquire().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.acquire().is_err(), "only one trial at a time");

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_trial_reopens_on_failure() {
        let breaker = CircuitBreaker::new(1, Duration::ZERO);
        breaker.record_failure();
        assert!(breaker.acquire().is_ok());
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
