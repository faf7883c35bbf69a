//! Async resolver using hickory-dns.
//!
//! Fully async, reads the system configuration once and keeps connections to
//! the configured name servers. Used as the default resolver for probes.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use std::{net::SocketAddr, sync::LazyLock};

/// Async resolver backed by hickory-dns.
///
/// All instances share one lazily built `TokioResolver`.
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    resolver: &'static LazyLock<TokioResolver>,
}

impl HickoryResolver {
    pub fn new() -> Self {
        static RESOLVER: LazyLock<TokioResolver> = LazyLock::new(|| {
            let mut builder = match TokioResolver::builder_tokio() {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to read system DNS config, using defaults"
                    );
                    TokioResolver::builder_with_config(
                        ResolverConfig::default(),
                        TokioConnectionProvider::default(),
                    )
                }
            };
            builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4thenIpv6;
            builder.build()
        });

        Self {
            resolver: &RESOLVER,
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let domain = name.as_str();
            tracing::debug!(domain = %domain, "resolving via hickory-dns");

            let lookup = resolver.resolver.lookup_ip(domain).await.map_err(|e| {
                tracing::debug!(domain = %domain, error = %e, "hickory-dns lookup failed");
                NetError::NameNotResolved
            })?;

            let addrs: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, 0)).collect();
            if addrs.is_empty() {
                return Err(NetError::NameNotResolved);
            }
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hickory_resolves_localhost() {
        let addrs: Vec<_> = HickoryResolver::new()
            .resolve(Name::new("localhost"))
            .await
            .unwrap()
            .collect();

        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|a| a.ip().is_loopback() && a.port() == 0));
    }

    #[tokio::test]
    async fn test_hickory_unresolvable_name() {
        let result = HickoryResolver::new()
            .resolve(Name::new("no-such-gateway.invalid"))
            .await;
        assert_eq!(result.err(), Some(NetError::NameNotResolved));
    }

    #[test]
    fn test_hickory_resolver_shares_instance() {
        let r1 = HickoryResolver::new();
        let r2 = HickoryResolver::default();
        assert!(std::ptr::eq(r1.resolver, r2.resolver));
    }
}
