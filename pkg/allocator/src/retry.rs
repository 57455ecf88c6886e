//! Retry policy and the allocation retry state machine.
//!
//! ```text
//!              success
//! Attempting ─────────────▶ Succeeded
//!     │  ▲
//!     │  │ resume
//!     │  └──────── Retrying { retry, delay }
//!     │ failure        ▲
//!     ├────────────────┘   (max_retries > 0, retries < max_retries)
//!     └──────────────▶ Exhausted(Disabled)   (max_retries == 0)
//!                      Exhausted(Limit)      (retries == max_retries)
//! ```

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use pkg_constants::network::ALLOCATION_ATTEMPT_TIMEOUT;
use pkg_constants::retry::{BACKOFF_MULTIPLIER, DEFAULT_MAX_RETRIES, INITIAL_BACKOFF, MAX_BACKOFF};
use std::time::Duration;

/// How an allocation is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f32,
    pub max_backoff: Duration,
    /// Deadline for one attempt (connect + call).
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            multiplier: BACKOFF_MULTIPLIER,
            max_backoff: MAX_BACKOFF,
            attempt_timeout: ALLOCATION_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_factor(self.multiplier)
            .with_max_times(self.max_retries as usize)
            .build()
    }
}

/// Why retrying stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// `max_retries` is zero: the first failure is final.
    Disabled,
    /// All `retries` retries were used.
    Limit { retries: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt number `attempt` (1-based) is in flight.
    Attempting { attempt: u32 },
    /// Retry number `retry` (1-based) starts after `delay`.
    Retrying { retry: u32, delay: Duration },
    Succeeded,
    Exhausted(Exhaustion),
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Exhausted(_))
    }
}

/// Drives one `allocate_with_retry` call. Backoff state lives and dies
/// with the machine.
pub struct RetryMachine {
    max_retries: u32,
    max_backoff: Duration,
    retries: u32,
    state: RetryState,
    backoff: ExponentialBackoff,
}

impl RetryMachine {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            max_backoff: policy.max_backoff,
            retries: 0,
            state: RetryState::Attempting { attempt: 1 },
            backoff: policy.backoff(),
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Retries consumed so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Attempting → Succeeded.
    pub fn succeed(&mut self) -> RetryState {
        if let RetryState::Attempting { .. } = self.state {
            self.state = RetryState::Succeeded;
        }
        self.state
    }

    /// Attempting → Retrying | Exhausted.
    pub fn fail(&mut self) -> RetryState {
        if let RetryState::Attempting { .. } = self.state {
            self.state = if self.max_retries == 0 {
                RetryState::Exhausted(Exhaustion::Disabled)
            } else if self.retries == self.max_retries {
                RetryState::Exhausted(Exhaustion::Limit {
                    retries: self.max_retries,
                })
            } else {
                self.retries += 1;
                let delay = self.backoff.next().unwrap_or(self.max_backoff);
                RetryState::Retrying {
                    retry: self.retries,
                    delay,
                }
            };
        }
        self.state
    }

    /// Retrying → Attempting, once the backoff delay has elapsed.
    pub fn resume(&mut self) -> RetryState {
        if let RetryState::Retrying { retry, .. } = self.state {
            self.state = RetryState::Attempting { attempt: retry + 1 };
        }
        self.state
    }
}
