//! Resolver error taxonomy.
//!
//! Classification outcomes ("this host is not a canister") are never errors.
//! Only three things are: the probe could not reach the host, the host
//! answered with a broken canister identifier, or the record store is
//! unusable.

use crate::base::neterror::NetError;
use thiserror::Error;

/// Coarse error category for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveErrorKind {
    /// Transport failure, retried and still failing.
    TransientNetwork,
    /// A canister identifier header was present but unparsable.
    MalformedIdentifier,
    /// The persistent record store could not be opened or accessed.
    StoreUnavailable,
    /// The lookup target has no host to key on.
    InvalidUrl,
}

/// Errors surfaced by [`CanisterResolver`](crate::resolver::CanisterResolver).
///
/// `Clone` because a single probe outcome is handed to every caller that
/// attached to it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("network failure probing {host}: {source}")]
    Network {
        host: String,
        #[source]
        source: NetError,
    },

    #[error("malformed canister id {value:?} from {host}: {reason}")]
    MalformedCanisterId {
        host: String,
        value: String,
        reason: String,
    },

    #[error("record store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("invalid lookup url: {0}")]
    InvalidUrl(String),
}

impl ResolveError {
    pub fn network(host: impl Into<String>, source: NetError) -> Self {
        Self::Network {
            host: host.into(),
            source,
        }
    }

    pub fn malformed(
        host: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::MalformedCanisterId {
            host: host.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            ResolveError::Network { .. } => ResolveErrorKind::TransientNetwork,
            ResolveError::MalformedCanisterId { .. } => ResolveErrorKind::MalformedIdentifier,
            ResolveError::StoreUnavailable { .. } => ResolveErrorKind::StoreUnavailable,
            ResolveError::InvalidUrl(_) => ResolveErrorKind::InvalidUrl,
        }
    }

    /// True for protocol violations by the probed host.
    pub fn is_malformed(&self) -> bool {
        self.kind() == ResolveErrorKind::MalformedIdentifier
    }
}

impl From<rusqlite::Error> for ResolveError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ffi::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ffi::ErrorCode::DatabaseLocked =>
            {
                ResolveError::store("database locked")
            }
            _ => ResolveError::store(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            ResolveError::network("a.io", NetError::ConnectionReset).kind(),
            ResolveErrorKind::TransientNetwork
        );
        assert_eq!(
            ResolveError::malformed("a.io", "x", "bad").kind(),
            ResolveErrorKind::MalformedIdentifier
        );
        assert_eq!(
            ResolveError::store("gone").kind(),
            ResolveErrorKind::StoreUnavailable
        );
        assert!(ResolveError::malformed("a.io", "x", "bad").is_malformed());
    }

    #[test]
    fn test_display_includes_host() {
        let err = ResolveError::network("www.dappdomain.io", NetError::ConnectionRefused);
        assert_eq!(
            err.to_string(),
            "network failure probing www.dappdomain.io: Connection refused"
        );
    }

    #[test]
    fn test_from_rusqlite() {
        let err: ResolveError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, ResolveError::StoreUnavailable { .. }));
    }
}
