//! Resolver configuration.

use crate::probe::CANISTER_ID_HEADER;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Canonical API endpoint of the trusted tier.
pub const TRUSTED_GATEWAY: &str = "https://icp-api.io";

/// Default lifetime of a host record.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Configuration options for [`CanisterResolver`](super::CanisterResolver).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// How long a record is served before the host is probed again.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Re-issues of a probe after a transport failure.
    pub max_retries: usize,

    /// Gateway returned for the trusted tier.
    pub trusted_gateway: String,

    /// Response header carrying the canister id.
    pub canister_id_header: String,

    /// Deadline for one probe attempt (None = transport default).
    #[serde(with = "opt_duration_secs")]
    pub probe_timeout: Option<Duration>,

    /// SQLite database for host records (None = in-memory store).
    pub store_path: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_retries: 1,
            trusted_gateway: TRUSTED_GATEWAY.to_string(),
            canister_id_header: CANISTER_ID_HEADER.to_string(),
            probe_timeout: Some(Duration::from_secs(30)),
            store_path: None,
        }
    }
}

impl ResolverConfig {
    /// Parse a JSON configuration. Missing fields keep their defaults;
    /// durations are given in seconds.
    ///
    /// ```rust,ignore
    /// let config = ResolverConfig::from_json_str(r#"{ "ttl": 600, "store_path": "/var/lib/hosts.db" }"#)?;
    /// ```
    #[cfg(feature = "json")]
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.trusted_gateway, "https://icp-api.io");
        assert_eq!(config.canister_id_header, "x-ic-canister-id");
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ResolverConfig::from_json_str(r#"{ "ttl": 600, "store_path": "/tmp/hosts.db" }"#)
                .unwrap();
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/hosts.db")));
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_from_json_disable_timeout() {
        let config = ResolverConfig::from_json_str(r#"{ "probe_timeout": null }"#).unwrap();
        assert_eq!(config.probe_timeout, None);
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        assert!(ResolverConfig::from_json_str(r#"{ "tll": 1 }"#).is_err());
    }
}
