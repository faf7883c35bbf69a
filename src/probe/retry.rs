//! Retry policy for probes.
//!
//! A probe that fails at the transport level is re-issued immediately, at
//! most `max_retries` times. There is no backoff: a lookup is on the
//! request path and a stale-free answer within the TTL window matters more
//! than protecting the gateway from one extra `HEAD`.

use super::{Probe, ProbeResponse};
use crate::base::neterror::NetError;
use url::Url;

/// Reasons for re-issuing a probe (mirrors Chromium's RetryReason enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Server closed connection unexpectedly
    ConnectionReset,
    /// Connection was closed during request
    ConnectionClosed,
    /// Connection could not be established
    ConnectionFailed,
    /// Name did not resolve
    NameNotResolved,
    /// TLS handshake failed
    SslHandshake,
    /// Empty or truncated response
    EmptyResponse,
    /// Probe exceeded its deadline
    Timeout,
    /// Any other transport failure
    Other,
}

impl RetryReason {
    /// Map a NetError to a RetryReason, if the error is retryable.
    pub fn from_error(error: &NetError) -> Option<Self> {
        if !error.is_transient() {
            return None;
        }
        Some(match error {
            NetError::ConnectionReset | NetError::ConnectionAborted => Self::ConnectionReset,
            NetError::ConnectionClosed | NetError::SocketNotConnected => Self::ConnectionClosed,
            NetError::ConnectionFailed
            | NetError::ConnectionRefused
            | NetError::AddressUnreachable => Self::ConnectionFailed,
            NetError::NameNotResolved | NetError::NameResolutionFailed => Self::NameNotResolved,
            NetError::SslProtocolError => Self::SslHandshake,
            NetError::EmptyResponse => Self::EmptyResponse,
            NetError::ConnectionTimedOut => Self::Timeout,
            _ => Self::Other,
        })
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Re-issues after the first attempt (default: 1).
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

impl RetryConfig {
    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self { max_retries: 0 }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

/// Check if we should retry after `retries_done` re-issues.
pub fn should_retry(retries_done: usize, config: &RetryConfig) -> bool {
    retries_done < config.max_retries
}

/// Run `probe.head(url)`, re-issuing on retryable transport failures.
pub async fn head_with_retry<P: Probe + ?Sized>(
    probe: &P,
    url: &Url,
    config: &RetryConfig,
) -> Result<ProbeResponse, NetError> {
    let mut retries = 0;
    loop {
        match probe.head(url.clone()).await {
            Ok(response) => return Ok(response),
            Err(e) => match RetryReason::from_error(&e) {
                Some(reason) if should_retry(retries, config) => {
                    retries += 1;
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        ?reason,
                        attempt = retries + 1,
                        "probe failed, retrying"
                    );
                }
                _ => return Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Probing;
    use http::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<ProbeResponse, NetError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<ProbeResponse, NetError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Probe for ScriptedProbe {
        fn head(&self, _url: Url) -> Probing {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(NetError::ConnectionFailed));
            Box::pin(async move { next })
        }
    }

    fn url() -> Url {
        Url::parse("https://www.dappdomain.io").unwrap()
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::default();
        assert!(should_retry(0, &config));
        assert!(!should_retry(1, &config));
        assert_eq!(config.max_attempts(), 2);
    }

    #[test]
    fn test_no_retry_config() {
        assert!(!should_retry(0, &RetryConfig::no_retry()));
    }

    #[test]
    fn test_invalid_url_is_not_retryable() {
        assert_eq!(RetryReason::from_error(&NetError::InvalidUrl), None);
        assert_eq!(
            RetryReason::from_error(&NetError::ConnectionRefused),
            Some(RetryReason::ConnectionFailed)
        );
    }

    #[tokio::test]
    async fn test_single_failure_then_success() {
        let probe = ScriptedProbe::new(vec![
            Err(NetError::ConnectionReset),
            Ok(ProbeResponse::status_only(StatusCode::OK)),
        ]);

        let response = head_with_retry(&probe, &url(), &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_one_retry() {
        let probe = ScriptedProbe::new(vec![
            Err(NetError::ConnectionReset),
            Err(NetError::ConnectionRefused),
            Ok(ProbeResponse::status_only(StatusCode::OK)),
        ]);

        let err = head_with_retry(&probe, &url(), &RetryConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ConnectionRefused);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_transient_error_not_retried() {
        let probe = ScriptedProbe::new(vec![Err(NetError::UnknownUrlScheme)]);

        let err = head_with_retry(&probe, &url(), &RetryConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, NetError::UnknownUrlScheme);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_error_status_is_not_a_failure() {
        let probe = ScriptedProbe::new(vec![Ok(ProbeResponse::status_only(
            StatusCode::INTERNAL_SERVER_ERROR,
        ))]);

        let response = head_with_retry(&probe, &url(), &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }
}
