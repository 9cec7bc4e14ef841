//! Bounded retry with exponential backoff for shared-memory transfers
//!
//! Two shapes of retry are needed:
//!
//! - Inline (`RetryPolicy::run`): the Execution Manager retries a transfer
//!   on the spot, sleeping between attempts.
//! - Across polls (`Backoff`): the bridge leaves a call pending and tries
//!   again on the next poll; `Backoff` counts consecutive failures and says
//!   when the ceiling has been reached.
//!
//! Both end in `GlyphError::RetriesExhausted` once `max_attempts` is spent.

use crate::error::{GlyphError, Result};
use crate::vm::backend::TransferError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry ceiling and backoff curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_backoff_ms: u64,
    /// Delay ceiling
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately (tests, tight host loops)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(GlyphError::Config("retry max_attempts must be at least 1".into()));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(GlyphError::Config(format!(
                "initial_backoff_ms {} exceeds max_backoff_ms {}",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Delay to wait after `failures` consecutive failures (1-based)
    pub fn backoff_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let shift = (failures - 1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` until it succeeds or the attempt ceiling is reached
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> std::result::Result<T, TransferError>) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    log::error!("{} failed after {} attempts: {}", what, attempt, err);
                    return Err(GlyphError::RetriesExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff_for(attempt);
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, self.max_attempts, err, delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

/// Consecutive-failure counter for retries spread across polls
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    /// Record a failure.
    ///
    /// Returns `HostIo` while attempts remain and `RetriesExhausted` once the
    /// ceiling is hit.
    pub fn record_failure(&mut self, err: TransferError) -> GlyphError {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.policy.max_attempts {
            GlyphError::RetriesExhausted {
                attempts: self.failures,
                last: err,
            }
        } else {
            GlyphError::HostIo(err)
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Suggested wait before the next attempt
    pub fn delay(&self) -> Duration {
        self.policy.backoff_for(self.failures)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_curve() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
        };
        assert_eq!(policy.backoff_for(0), Duration::ZERO);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(10));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(20));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(40));
        assert_eq!(policy.backoff_for(5), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(100));
    }

    #[test]
    fn test_run_succeeds_after_failures() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let value = policy
            .run("read", || {
                calls += 1;
                if calls < 3 {
                    Err(TransferError::Unavailable)
                } else {
                    Ok(7u32)
                }
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_run_exhausts() {
        let policy = RetryPolicy::immediate(2);
        let mut calls = 0;
        let result: Result<()> = policy.run("write", || {
            calls += 1;
            Err(TransferError::Unavailable)
        });
        assert_eq!(calls, 2);
        assert!(matches!(
            result,
            Err(GlyphError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_backoff_tracker() {
        let mut backoff = Backoff::new(RetryPolicy::immediate(3));
        assert!(matches!(
            backoff.record_failure(TransferError::Unavailable),
            GlyphError::HostIo(_)
        ));
        assert!(matches!(
            backoff.record_failure(TransferError::Unavailable),
            GlyphError::HostIo(_)
        ));
        assert!(matches!(
            backoff.record_failure(TransferError::Unavailable),
            GlyphError::RetriesExhausted { attempts: 3, .. }
        ));

        backoff.record_success();
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::immediate(0).validate().is_err());
        let inverted = RetryPolicy {
            max_attempts: 1,
            initial_backoff_ms: 50,
            max_backoff_ms: 10,
        };
        assert!(inverted.validate().is_err());
    }
}
