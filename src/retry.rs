//! Bounded retry with exponential backoff.
//!
//! Both boot-time loops (Wi-Fi association and MQTT broker connect) run
//! through [`RetryPolicy::run`].  A policy bounds the attempt count *and*
//! the wall-clock time, so a missing access point or an unreachable broker
//! degrades to a logged failure instead of hanging the device.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::ClockPort;

/// Attempt and time budget for one retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.  Zero is treated as one.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub initial_backoff_ms: u32,
    /// Ceiling for the doubled backoff.
    pub max_backoff_ms: u32,
    /// Overall budget measured from the first attempt; `0` disables it.
    pub timeout_ms: u32,
}

impl RetryPolicy {
    /// Wi-Fi association: first retry after 500 ms, give up after a minute.
    pub const WIFI: Self = Self {
        max_attempts: 20,
        initial_backoff_ms: 500,
        max_backoff_ms: 8_000,
        timeout_ms: 60_000,
    };

    /// MQTT broker connect: first retry after 100 ms, give up after 30 s.
    pub const BACKEND: Self = Self {
        max_attempts: 10,
        initial_backoff_ms: 100,
        max_backoff_ms: 5_000,
        timeout_ms: 30_000,
    };

    /// Backoff to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> u32 {
        let shift = attempt.saturating_sub(1).min(31);
        let scaled = u64::from(self.initial_backoff_ms) << shift;
        scaled.min(u64::from(self.max_backoff_ms)) as u32
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number.  No delay follows the
    /// final attempt, and a backoff is cut short so the overall timeout is
    /// not overshot.
    pub fn run<T, E, C, D, F>(&self, clock: &C, delay: &mut D, mut op: F) -> Result<T, RetryError<E>>
    where
        C: ClockPort + ?Sized,
        D: DelayNs + ?Sized,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let started = clock.uptime_ms();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let last = match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let elapsed = clock.uptime_ms().saturating_sub(started);
            if attempt >= max_attempts {
                warn!("RETRY | giving up after {} attempts", attempt);
                return Err(RetryError::Exhausted { attempts: attempt, last });
            }
            if self.timeout_ms != 0 && elapsed >= u64::from(self.timeout_ms) {
                warn!("RETRY | timed out after {} attempts ({} ms)", attempt, elapsed);
                return Err(RetryError::TimedOut { attempts: attempt, elapsed_ms: elapsed, last });
            }

            let mut wait = u64::from(self.backoff_for(attempt));
            if self.timeout_ms != 0 {
                wait = wait.min(u64::from(self.timeout_ms) - elapsed);
            }
            debug!("RETRY | attempt {} failed, waiting {} ms", attempt, wait);
            delay.delay_ms(wait as u32);
        }
    }
}

/// Why [`RetryPolicy::run`] gave up.  Carries the last operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, last: E },
    TimedOut { attempts: u32, elapsed_ms: u64, last: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn into_last(self) -> E {
        match self {
            Self::Exhausted { last, .. } | Self::TimedOut { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::TimedOut { attempts, elapsed_ms, last } => {
                write!(f, "timed out after {attempts} attempts in {elapsed_ms} ms: {last}")
            }
        }
    }
}
