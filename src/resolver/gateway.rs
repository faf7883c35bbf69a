//! Gateway selection.
//!
//! On the trusted tier the gateway is a fixed, well-known API endpoint. Off
//! it, the resolver itself is served from `<canister-id>.<gateway-domain>`
//! and the gateway is whatever follows the leading label.

use crate::base::error::ResolveError;
use std::fmt;
use std::sync::{Arc, RwLock};
use url::Url;

/// A gateway origin, always `scheme://host[:port]` with no path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Gateway {
    url: Url,
}

impl Gateway {
    /// Parse and normalize to the origin of `input`.
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let url = Url::parse(input).map_err(|e| ResolveError::InvalidUrl(format!("{input}: {e}")))?;
        Self::from_url(&url).ok_or_else(|| ResolveError::InvalidUrl(input.to_string()))
    }

    fn from_url(url: &Url) -> Option<Self> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return None;
        }
        Url::parse(&origin.ascii_serialization())
            .ok()
            .map(|url| Self { url })
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Origin serialization, e.g. `https://ic1.app`.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

impl PartialEq<Url> for Gateway {
    fn eq(&self, other: &Url) -> bool {
        Self::from_url(other).is_some_and(|g| g.url == self.url)
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin())
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gateway({})", self.origin())
    }
}

/// Read access to the URL the resolver is currently running under.
pub trait Location: Send + Sync {
    fn current_url(&self) -> Url;
}

/// A location that never changes.
#[derive(Debug, Clone)]
pub struct FixedLocation(Url);

impl FixedLocation {
    pub fn new(url: Url) -> Self {
        Self(url)
    }
}

impl Location for FixedLocation {
    fn current_url(&self) -> Url {
        self.0.clone()
    }
}

/// A location the host environment can update, e.g. after a navigation.
#[derive(Debug, Clone)]
pub struct SharedLocation {
    url: Arc<RwLock<Url>>,
}

impl SharedLocation {
    pub fn new(url: Url) -> Self {
        Self {
            url: Arc::new(RwLock::new(url)),
        }
    }

    pub fn set(&self, url: Url) {
        match self.url.write() {
            Ok(mut guard) => *guard = url,
            Err(poisoned) => *poisoned.into_inner() = url,
        }
    }
}

impl Location for SharedLocation {
    fn current_url(&self) -> Url {
        match self.url.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Picks the gateway for the current execution context.
pub struct GatewaySelector {
    trusted: Gateway,
    location: Option<Arc<dyn Location>>,
}

impl GatewaySelector {
    pub fn new(trusted: Gateway, location: Option<Arc<dyn Location>>) -> Self {
        Self { trusted, location }
    }

    /// The trusted endpoint on the trusted tier, otherwise the gateway domain
    /// derived from the current hostname. `None` when there is no location
    /// or its host has no gateway domain to derive.
    pub fn current_gateway(&self, is_trusted_tier: bool) -> Option<Gateway> {
        if is_trusted_tier {
            return Some(self.trusted.clone());
        }

        let current = self.location.as_ref()?.current_url();
        let gateway = derive_gateway(&current);
        if gateway.is_none() {
            tracing::debug!(url = %current, "no gateway domain in current hostname");
        }
        gateway
    }
}

impl fmt::Debug for GatewaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySelector")
            .field("trusted", &self.trusted)
            .field("has_location", &self.location.is_some())
            .finish()
    }
}

/// `https://<everything after the first label>` of a domain host.
pub fn derive_gateway(current: &Url) -> Option<Gateway> {
    // IP literals have no label structure.
    let domain = current.domain()?;
    let (_canister_label, gateway_domain) = domain.split_once('.')?;
    if gateway_domain.is_empty() {
        return None;
    }
    Gateway::parse(&format!("https://{gateway_domain}")).ok()
}
