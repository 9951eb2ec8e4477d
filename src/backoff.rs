//! Backoff strategies.
//!
//! A backoff decides two things for the executor: the deadline applied to each
//! attempt ([`Backoff::timeout`]) and the pause taken before the next attempt
//! ([`Backoff::start`]). Both use the same current timeout value, which only
//! grows through [`Backoff::advance`] and returns to its starting value on
//! [`Backoff::reset`].

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{sync::oneshot, task::JoinHandle, time::Instant};

/// Starting timeout of [`default_backoff`].
pub const EXPONENTIAL_START: Duration = Duration::from_secs(30);
/// Upper bound of [`default_backoff`] (three bumps of the starting timeout).
pub const EXPONENTIAL_MAX: Duration = Duration::from_secs(30 * 8);
/// Base multiplier of [`default_backoff`].
pub const EXPONENTIAL_MULTIPLIER: u32 = 2;

/// Incremental timeout/backoff behavior used by [`HttpClient`](crate::HttpClient).
///
/// Implementations must keep `timeout()` within their configured bounds and
/// must treat `stop()` as idempotent.
pub trait Backoff: Send {
    /// Returns the backoff to its starting state. Does not touch a running timer.
    fn reset(&mut self);

    /// Current timeout value.
    fn timeout(&self) -> Duration;

    /// Grows the timeout and returns the new value.
    ///
    /// Once the upper limit is reached this keeps returning the limit.
    fn advance(&mut self) -> Duration;

    /// Arms a timer for the current timeout.
    ///
    /// Any previously started timer is stopped first, so its [`BackoffTimer`]
    /// resolves to `None`.
    ///
    /// # Panics
    ///
    /// Implementations backed by [`BackoffTimer::spawn`] panic when called
    /// outside a Tokio runtime.
    fn start(&mut self) -> BackoffTimer;

    /// Terminates a running timer, if any.
    fn stop(&mut self);
}

/// Receiving half of a timer armed by [`Backoff::start`].
///
/// Resolves to `Some(instant)` when the timer elapses, or `None` when the
/// timer was stopped before it fired.
#[derive(Debug)]
pub struct BackoffTimer {
    rx: oneshot::Receiver<Instant>,
}

impl BackoffTimer {
    /// Arms a one-shot timer task; the returned handle aborts it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn(duration: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(Instant::now());
        });
        (Self { rx }, task)
    }
}

impl Future for BackoffTimer {
    type Output = Option<Instant>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

/// Returns the default backoff: exponential(initial=30s, max=4m, x2 on advance).
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(EXPONENTIAL_START, EXPONENTIAL_MAX, EXPONENTIAL_MULTIPLIER)
}

/// Returns a backoff that always uses `delay`.
///
/// Equivalent to `ExponentialBackoff::new(delay, delay, 1)`.
pub fn static_backoff(delay: Duration) -> ExponentialBackoff {
    ExponentialBackoff::new(delay, delay, 1)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ExponentialSettings {
    starting_timeout: Duration,
    max_timeout: Duration,
    base_multiplier: u32,
}

/// Backoff whose timeout grows by a self-squaring multiplier of the starting
/// timeout, clamped to a maximum.
///
/// With a base multiplier of 2 the sequence is `start`, `2*start`,
/// `4*start`, `16*start`, ... until `max` is reached.
pub struct ExponentialBackoff {
    settings: ExponentialSettings,
    timeout: Duration,
    multiplier: u32,
    timer: Option<JoinHandle<()>>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff.
    ///
    /// A `multiplier` below 1 is raised to 1, and a `max_timeout` below
    /// `start_timeout` is raised to `start_timeout`.
    pub fn new(start_timeout: Duration, max_timeout: Duration, multiplier: u32) -> Self {
        let multiplier = if multiplier < 1 {
            tracing::debug!(multiplier, "backoff multiplier below 1, using 1");
            1
        } else {
            multiplier
        };
        let max_timeout = if max_timeout < start_timeout {
            tracing::debug!(
                ?max_timeout,
                ?start_timeout,
                "backoff max below start, using start"
            );
            start_timeout
        } else {
            max_timeout
        };

        Self {
            settings: ExponentialSettings {
                starting_timeout: start_timeout,
                max_timeout,
                base_multiplier: multiplier,
            },
            timeout: start_timeout,
            multiplier,
            timer: None,
        }
    }

    pub fn starting_timeout(&self) -> Duration {
        self.settings.starting_timeout
    }

    pub fn max_timeout(&self) -> Duration {
        self.settings.max_timeout
    }

    /// Returns `true` while a started timer has not been stopped.
    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Backoff for ExponentialBackoff {
    fn reset(&mut self) {
        self.timeout = self.settings.starting_timeout;
        self.multiplier = self.settings.base_multiplier;
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn advance(&mut self) -> Duration {
        self.stop();

        let candidate = self.settings.starting_timeout.saturating_mul(self.multiplier);
        if candidate < self.settings.max_timeout {
            self.timeout = candidate;
            self.multiplier = self.multiplier.saturating_mul(self.multiplier);
        } else {
            self.timeout = self.settings.max_timeout;
        }
        self.timeout
    }

    fn start(&mut self) -> BackoffTimer {
        self.stop();
        let (timer, task) = BackoffTimer::spawn(self.timeout);
        self.timer = Some(task);
        timer
    }

    fn stop(&mut self) {
        if let Some(task) = self.timer.take() {
            task.abort();
        }
    }
}

impl Drop for ExponentialBackoff {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("starting_timeout", &self.settings.starting_timeout)
            .field("max_timeout", &self.settings.max_timeout)
            .field("base_multiplier", &self.settings.base_multiplier)
            .field("timeout", &self.timeout)
            .field("multiplier", &self.multiplier)
            .field("running", &self.timer.is_some())
            .finish()
    }
}
