//! `resilient-http` executes HTTP requests with per-attempt deadlines,
//! automatic retries and mid-flight cancellation.
//!
//! - [`HttpClient::execute`] runs a [`Request`] under the configured policies
//! - [`Backoff`] decides each attempt's deadline and the pause between attempts
//! - [`RetryHandler`] decides how many attempts are permitted
//! - [`HttpClient::cancel`] / [`CancelHandle`] abort an execution in flight

pub mod backoff;
mod client;
mod error;
mod options;
pub mod request;
mod response;
pub mod retry;

pub use backoff::{default_backoff, static_backoff, Backoff, BackoffTimer, ExponentialBackoff};
pub use client::{default_client, CancelHandle, HttpClient};
pub use error::HttpClientError;
pub use options::ClientOptions;
pub use request::{binary_body, custom_body, json_body, no_body, BodyProvider, Request};
pub use response::Response;
pub use retry::{default_retry_handler, RetryCounter, RetryHandler};

pub type Result<T> = std::result::Result<T, HttpClientError>;
