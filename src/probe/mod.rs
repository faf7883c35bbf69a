//! Network probe: one `HEAD` exchange per lookup attempt.
//!
//! The probe is deliberately opaque. Callers see the status code and a
//! single allow-listed header; bodies, cookies and every other header are
//! dropped at the transport boundary.

mod http;
pub mod retry;

pub use self::http::HttpProbe;

use crate::base::neterror::NetError;
use ::http::StatusCode;
use std::{future::Future, pin::Pin, sync::Arc};
use url::Url;

/// Header carrying the canister identifier for a custom domain.
pub const CANISTER_ID_HEADER: &str = "x-ic-canister-id";

/// What a probe is allowed to observe about a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    status: StatusCode,
    canister_id: Option<String>,
}

impl ProbeResponse {
    pub fn new(status: StatusCode, canister_id: Option<String>) -> Self {
        Self {
            status,
            canister_id,
        }
    }

    /// A response with no canister header.
    pub fn status_only(status: StatusCode) -> Self {
        Self::new(status, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Raw, unvalidated value of the canister id header, if present.
    pub fn canister_id(&self) -> Option<&str> {
        self.canister_id.as_deref()
    }
}

/// Alias for the `Future` type returned by a probe.
pub type Probing = Pin<Box<dyn Future<Output = Result<ProbeResponse, NetError>> + Send>>;

/// Issues the `HEAD` request for a lookup.
///
/// An `Err` means the exchange never produced an HTTP response (transport
/// failure). Any HTTP status, including 5xx, is an `Ok`.
pub trait Probe: Send + Sync {
    fn head(&self, url: Url) -> Probing;
}

impl<P: Probe + ?Sized> Probe for Arc<P> {
    fn head(&self, url: Url) -> Probing {
        (**self).head(url)
    }
}
