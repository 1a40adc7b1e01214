//! The HTTP boundary: a [Transport] trait, the `ureq`-backed implementation and
//! the retry policy it runs under.

use std::time::Duration;

use tracing::{debug, warn};

use crate::constants::{MAX_BODY_BYTES, RETRY_STATUSES, USER_AGENT};
use crate::error::TransportError;

/// Blocking GET returning the raw body on any 2xx.
pub trait Transport {
    /// Fetch `url` with the given query parameters appended.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
        (**self).get(url, query)
    }
}

/// How the transport retries a single request.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, including the first one.
    pub max_attempts: u32,
    /// Base delay in seconds, doubled after each failed try.
    pub backoff_factor: f64,
    /// HTTP statuses worth another go.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 0.5,
            retry_statuses: RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sleep before try number `attempt` (1-based); the first try never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.backoff_factor * f64::from(2u32.saturating_pow(attempt - 2));
        Duration::try_from_secs_f64(factor).unwrap_or(Duration::ZERO)
    }

    /// Whether `err` is worth retrying under this policy.
    pub fn should_retry(&self, err: &TransportError) -> bool {
        err.is_transient(&self.retry_statuses)
    }

    /// Runs `op` until it succeeds, fails permanently or runs out of tries.
    pub fn execute<T>(
        &self,
        mut op: impl FnMut() -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && self.should_retry(&err) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Request failed ({}), retry {}/{} in {:?}",
                        err, attempt, max_attempts, delay
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// [Transport] over a shared `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Builds an agent with a global per-request timeout.
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, policy }
    }

    fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
        let mut request = self.agent.get(url).header("User-Agent", USER_AGENT.as_str());
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let mut body = response.into_body();
        body.with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|err| match err {
                ureq::Error::Timeout(_) => TransportError::Timeout,
                other => TransportError::Body(other.to_string()),
            })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
        debug!("GET {} {:?}", url, query);
        self.policy.execute(|| self.get_once(url, query))
    }
}
