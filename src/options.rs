use std::time::Duration;

use crate::{
    backoff::{EXPONENTIAL_MAX, EXPONENTIAL_MULTIPLIER, EXPONENTIAL_START},
    retry::DEFAULT_MAX_RETRIES,
    ExponentialBackoff, HttpClientError, Result, RetryCounter,
};

const ENV_START_TIMEOUT_MS: &str = "RESILIENT_HTTP_START_TIMEOUT_MS";
const ENV_MAX_TIMEOUT_MS: &str = "RESILIENT_HTTP_MAX_TIMEOUT_MS";
const ENV_MULTIPLIER: &str = "RESILIENT_HTTP_MULTIPLIER";
const ENV_MAX_RETRIES: &str = "RESILIENT_HTTP_MAX_RETRIES";

/// Configures timeout backoff and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Deadline of the first attempt in milliseconds.
    pub start_timeout_ms: u64,
    /// Upper bound for the per-attempt deadline in milliseconds.
    pub max_timeout_ms: u64,
    /// Base multiplier of the exponential backoff.
    pub multiplier: u32,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            start_timeout_ms: EXPONENTIAL_START.as_millis() as u64,
            max_timeout_ms: EXPONENTIAL_MAX.as_millis() as u64,
            multiplier: EXPONENTIAL_MULTIPLIER,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientOptions {
    /// Reads options from environment variables.
    ///
    /// Reads:
    /// - `RESILIENT_HTTP_START_TIMEOUT_MS`
    /// - `RESILIENT_HTTP_MAX_TIMEOUT_MS`
    /// - `RESILIENT_HTTP_MULTIPLIER`
    /// - `RESILIENT_HTTP_MAX_RETRIES`
    ///
    /// Unset variables keep their default; unparsable values are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            start_timeout_ms: parse_var(&lookup, ENV_START_TIMEOUT_MS)?
                .unwrap_or(defaults.start_timeout_ms),
            max_timeout_ms: parse_var(&lookup, ENV_MAX_TIMEOUT_MS)?
                .unwrap_or(defaults.max_timeout_ms),
            multiplier: parse_var(&lookup, ENV_MULTIPLIER)?.unwrap_or(defaults.multiplier),
            max_retries: parse_var(&lookup, ENV_MAX_RETRIES)?.unwrap_or(defaults.max_retries),
        })
    }

    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.start_timeout_ms),
            Duration::from_millis(self.max_timeout_ms),
            self.multiplier,
        )
    }

    pub(crate) fn retry_handler(&self) -> RetryCounter {
        RetryCounter::new(self.max_retries)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|err| HttpClientError::Config(format!("invalid {key} value '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::ClientOptions;
    use crate::{Backoff, HttpClientError, RetryHandler};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_policy() {
        let opts = ClientOptions::default();
        assert_eq!(opts.start_timeout_ms, 30_000);
        assert_eq!(opts.max_timeout_ms, 240_000);
        assert_eq!(opts.multiplier, 2);
        assert_eq!(opts.max_retries, 3);
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let opts = ClientOptions::from_lookup(lookup(&[])).expect("defaults must load");
        assert_eq!(opts, ClientOptions::default());
    }

    #[test]
    fn variables_override_defaults() {
        let opts = ClientOptions::from_lookup(lookup(&[
            ("RESILIENT_HTTP_START_TIMEOUT_MS", "100"),
            ("RESILIENT_HTTP_MAX_TIMEOUT_MS", " 800 "),
            ("RESILIENT_HTTP_MAX_RETRIES", "0"),
        ]))
        .expect("options must load");
        assert_eq!(opts.start_timeout_ms, 100);
        assert_eq!(opts.max_timeout_ms, 800);
        assert_eq!(opts.multiplier, 2);
        assert_eq!(opts.max_retries, 0);

        let backoff = opts.backoff();
        assert_eq!(backoff.timeout(), Duration::from_millis(100));
        assert_eq!(backoff.max_timeout(), Duration::from_millis(800));

        let mut retry = opts.retry_handler();
        assert!(retry.advance());
        assert!(!retry.safe_to_retry());
    }

    #[test]
    fn invalid_variable_is_config_error() {
        let err = ClientOptions::from_lookup(lookup(&[("RESILIENT_HTTP_MULTIPLIER", "two")]))
            .expect_err("invalid multiplier must fail");
        match err {
            HttpClientError::Config(message) => {
                assert!(message.contains("RESILIENT_HTTP_MULTIPLIER"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
