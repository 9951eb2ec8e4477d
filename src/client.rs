use std::{fmt, pin::Pin, sync::Arc};

use tokio::sync::{futures::Notified, Notify};
use tracing::Instrument;

use crate::{
    backoff::default_backoff, retry::default_retry_handler, Backoff, ClientOptions,
    HttpClientError, Request, Response, Result, RetryHandler,
};

const DEFAULT_CLIENT_NAME: &str = "http-client";

/// Cancels the execution in flight on the [`HttpClient`] it was taken from.
///
/// Cancelling is idempotent and only reaches executions that have already
/// started; a later [`HttpClient::execute`] is not affected.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.notify.notify_waiters();
    }
}

/// Lifecycle of a single [`HttpClient::execute`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ExecState {
    Idle,
    Attempting,
    AwaitingBackoff,
    Succeeded,
    TimedOut,
    Canceled,
    /// The transport call failed for a reason other than its deadline.
    Failed,
}

impl ExecState {
    fn can_transition_to(self, next: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (self, next),
            (Idle, Attempting)
                | (Idle, TimedOut)
                | (Attempting, Succeeded)
                | (Attempting, AwaitingBackoff)
                | (Attempting, Canceled)
                | (Attempting, Failed)
                | (AwaitingBackoff, Attempting)
                | (AwaitingBackoff, TimedOut)
                | (AwaitingBackoff, Canceled)
        )
    }

    fn transition(&mut self, next: ExecState) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self,
            next
        );
        tracing::trace!(from = ?*self, to = ?next, "execution state");
        *self = next;
    }
}

/// HTTP client that executes requests with per-attempt deadlines, retries and
/// cancellation.
///
/// Each attempt is bounded by the backoff's current timeout. When an attempt
/// runs past its deadline the retry handler is consulted; if another attempt
/// is allowed the backoff is advanced and its timer awaited before trying
/// again. Transport failures and non-success status codes are not retried.
///
/// `execute` borrows the client mutably, so the backoff and retry handler are
/// never shared between concurrent executions. Use [`HttpClient::cancel_handle`]
/// to cancel from another task.
pub struct HttpClient {
    name: String,
    http: reqwest::Client,
    backoff: Box<dyn Backoff>,
    retry: Box<dyn RetryHandler>,
    cancel: CancelHandle,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("name", &self.name)
            .field("timeout", &self.backoff.timeout())
            .field("retry", &self.retry.state())
            .finish()
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_NAME)
    }
}

/// Returns a client with the default backoff and retry handler.
pub fn default_client() -> HttpClient {
    HttpClient::default()
}

impl HttpClient {
    /// Creates a client whose log events carry `name`.
    ///
    /// Uses exponential backoff (30s, max 4m, x2) and 3 retries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http: reqwest::Client::new(),
            backoff: Box::new(default_backoff()),
            retry: Box::new(default_retry_handler()),
            cancel: CancelHandle::default(),
        }
    }

    /// Replaces the logger name recorded on execution spans.
    pub fn with_logger(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    pub fn with_retry_handler(mut self, retry: impl RetryHandler + 'static) -> Self {
        self.retry = Box::new(retry);
        self
    }

    /// Replaces backoff and retry handler with the ones described by `opts`.
    pub fn with_options(self, opts: ClientOptions) -> Self {
        let backoff = opts.backoff();
        let retry = opts.retry_handler();
        self.with_backoff(backoff).with_retry_handler(retry)
    }

    /// Uses a pre-configured `reqwest` client as transport.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retry handler snapshot, e.g. `"attempt 2 of 4"` after an execution.
    pub fn retry_state(&self) -> String {
        self.retry.state()
    }

    /// Cancels the execution in flight, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle that cancels executions of this client from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Executes `request`, retrying attempts that exceed their deadline.
    ///
    /// Backoff and retry handler are reset before the first attempt.
    ///
    /// Returns:
    /// - the response of the first attempt that completes in time, whatever
    ///   its status code
    /// - [`HttpClientError::RequestTimeout`] once the retry budget is spent
    /// - [`HttpClientError::Canceled`] when [`HttpClient::cancel`] interrupts
    ///   an attempt or the wait between attempts
    /// - [`HttpClientError::Transport`] for any other transport failure
    pub async fn execute(&mut self, request: &Request) -> Result<Response> {
        let span = tracing::info_span!(
            "http_execute",
            client = %self.name,
            method = %request.method(),
            url = %request.url(),
        );

        // Registered before the first attempt so a cancel issued at any point
        // during this call is observed.
        let notify = Arc::clone(&self.cancel.notify);
        let canceled = notify.notified();
        tokio::pin!(canceled);

        self.backoff.reset();
        self.retry.reset();
        let result = self.run(request, canceled).instrument(span).await;
        self.backoff.stop();
        result
    }

    async fn run(
        &mut self,
        request: &Request,
        mut canceled: Pin<&mut Notified<'_>>,
    ) -> Result<Response> {
        let mut state = ExecState::Idle;

        if !self.retry.advance() {
            state.transition(ExecState::TimedOut);
            tracing::warn!(attempt = %self.retry.state(), "retry handler permits no attempts");
            return Err(HttpClientError::RequestTimeout);
        }

        loop {
            state.transition(ExecState::Attempting);
            let deadline = self.backoff.timeout();
            tracing::debug!(attempt = %self.retry.state(), ?deadline, "sending request");

            let attempt = tokio::time::timeout(deadline, send(&self.http, request));
            let outcome = tokio::select! {
                biased;
                _ = canceled.as_mut() => {
                    state.transition(ExecState::Canceled);
                    tracing::debug!(attempt = %self.retry.state(), "request canceled");
                    return Err(HttpClientError::Canceled);
                }
                outcome = attempt => outcome,
            };

            match outcome {
                Ok(Ok(response)) => {
                    state.transition(ExecState::Succeeded);
                    tracing::debug!(
                        attempt = %self.retry.state(),
                        status = response.status().as_u16(),
                        "request completed"
                    );
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    state.transition(ExecState::Failed);
                    tracing::debug!(attempt = %self.retry.state(), error = %err, "request failed");
                    return Err(err);
                }
                Err(_) => state.transition(ExecState::AwaitingBackoff),
            }

            if !self.retry.advance() {
                state.transition(ExecState::TimedOut);
                tracing::warn!(
                    attempt = %self.retry.state(),
                    ?deadline,
                    "request timed out, no retries left"
                );
                return Err(HttpClientError::RequestTimeout);
            }

            let delay = self.backoff.advance();
            tracing::debug!(
                attempt = %self.retry.state(),
                ?delay,
                "request timed out, retrying after backoff"
            );

            let timer = self.backoff.start();
            tokio::select! {
                biased;
                _ = canceled.as_mut() => {
                    self.backoff.stop();
                    state.transition(ExecState::Canceled);
                    tracing::debug!(attempt = %self.retry.state(), "request canceled during backoff");
                    return Err(HttpClientError::Canceled);
                }
                _ = timer => {}
            }
        }
    }
}

async fn send(http: &reqwest::Client, request: &Request) -> Result<Response> {
    let response = request
        .to_builder(http)
        .send()
        .await
        .map_err(HttpClientError::Transport)?;
    Response::read(response).await
}
