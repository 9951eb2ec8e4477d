//! Retry handlers decide whether another attempt is permitted.

use std::fmt;

/// Retries after the initial attempt granted by [`default_retry_handler`].
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Automatic retry behavior used by [`HttpClient`](crate::HttpClient).
pub trait RetryHandler: Send {
    /// Reports whether another attempt may be made.
    fn safe_to_retry(&self) -> bool;

    /// Moves to the next attempt and reports whether it was safe to do so.
    ///
    /// A `false` return means the handler did not advance.
    fn advance(&mut self) -> bool;

    /// Returns the handler to its starting state.
    fn reset(&mut self);

    /// Human-readable snapshot such as `"attempt 1 of 4"`.
    fn state(&self) -> String;
}

/// Returns the default retry handler: give up after 3 retries.
pub fn default_retry_handler() -> RetryCounter {
    RetryCounter::new(DEFAULT_MAX_RETRIES)
}

/// Counts attempts against a fixed retry budget.
///
/// The initial attempt is not a retry, so `max_retries = 0` allows one
/// attempt, `max_retries = 1` allows two, and so on. Call
/// [`RetryHandler::advance`] right before each attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryCounter {
    max_retries: usize,
    attempt: usize,
}

impl RetryCounter {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            attempt: 0,
        }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> usize {
        self.attempt
    }
}

impl Default for RetryCounter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryHandler for RetryCounter {
    fn safe_to_retry(&self) -> bool {
        self.attempt <= self.max_retries
    }

    fn advance(&mut self) -> bool {
        let is_safe = self.safe_to_retry();
        if is_safe {
            self.attempt += 1;
        }
        is_safe
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn state(&self) -> String {
        format!(
            "attempt {} of {}",
            self.attempt,
            self.max_retries.saturating_add(1)
        )
    }
}

impl fmt::Display for RetryCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.state())
    }
}
