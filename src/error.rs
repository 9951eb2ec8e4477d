/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    /// Every permitted attempt exceeded its deadline and the retry budget is spent.
    #[error("request timeout")]
    RequestTimeout,
    /// The execution was interrupted by [`HttpClient::cancel`](crate::HttpClient::cancel).
    #[error("request canceled")]
    Canceled,
    /// Network or request execution error from `reqwest`. Never retried.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// A request was built without a URL.
    #[error("missing uri")]
    MissingUri,
    /// The request body could not be serialized.
    #[error("failed to marshal body: {0}")]
    Body(serde_json::Error),
    /// Response body decoding error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid client configuration value.
    #[error("config error: {0}")]
    Config(String),
}

impl HttpClientError {
    /// Returns `true` when the retry budget was exhausted by deadline overruns.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout)
    }

    /// Returns `true` when the execution was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
