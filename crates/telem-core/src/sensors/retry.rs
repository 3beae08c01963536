//! Bounded retry with exponential backoff, used for sensor bring-up.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay_ms: u32,
    /// Upper bound for any single delay.
    pub max_delay_ms: u32,
    /// Growth factor applied after every failed attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 4000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delays to sleep between attempts. Yields `max_attempts - 1` values,
    /// so exhausting the iterator means the last attempt has been made.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next_delay_ms: self.initial_delay_ms.min(self.max_delay_ms),
            remaining: self.max_attempts.saturating_sub(1),
            max_delay_ms: self.max_delay_ms,
            multiplier: self.multiplier.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    next_delay_ms: u32,
    remaining: u32,
    max_delay_ms: u32,
    multiplier: u32,
}

impl Iterator for Backoff {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.next_delay_ms;
        self.next_delay_ms = delay
            .saturating_mul(self.multiplier)
            .min(self.max_delay_ms);
        Some(delay)
    }
}
