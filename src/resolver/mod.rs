//! The canister resolver.
//!
//! [`CanisterResolver`] is the entry point. It opens the record store once,
//! picks the gateway for the current execution context and classifies
//! hostnames through the [`LookupEngine`].
//!
//! ```rust,ignore
//! let resolver = CanisterResolver::builder()
//!     .location(FixedLocation::new(Url::parse("https://rdmx6-jaaaa-aaaaa-aaadq-cai.ic0.app")?))
//!     .build();
//!
//! let gateway = resolver.current_gateway(false).await?;
//! let canister = resolver.lookup(&Url::parse("https://www.customdappdomain.io")?).await?;
//! ```

mod config;
mod engine;
mod gateway;

pub use config::{ResolverConfig, DEFAULT_TTL, TRUSTED_GATEWAY};
pub use engine::{LookupEngine, LookupStats};
pub use gateway::{derive_gateway, FixedLocation, Gateway, GatewaySelector, Location, SharedLocation};

use crate::base::clock::{Clock, SystemClock};
use crate::base::error::ResolveError;
use crate::canister::CanisterId;
use crate::probe::retry::RetryConfig;
use crate::probe::{HttpProbe, Probe};
use crate::store::{HostRecord, MemoryStoreOpener, OpenHostStore, SqliteStoreOpener};
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

/// State built by the first successful `setup`.
struct Ready {
    engine: LookupEngine,
    gateways: GatewaySelector,
}

/// Resolves hostnames to canisters and picks the gateway to reach them.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct CanisterResolver {
    config: ResolverConfig,
    opener: Arc<dyn OpenHostStore>,
    probe: Arc<dyn Probe>,
    clock: Arc<dyn Clock>,
    location: Option<Arc<dyn Location>>,
    ready: OnceCell<Result<Ready, ResolveError>>,
}

impl CanisterResolver {
    /// Resolver with default configuration and no execution-context location.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CanisterResolverBuilder {
        CanisterResolverBuilder::default()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Open the record store and wire up the engine.
    ///
    /// Idempotent: concurrent and later calls wait for and share the first
    /// call's outcome, so the store is opened at most once. A failure is
    /// kept and returned to every later call.
    pub async fn setup(&self) -> Result<&Self, ResolveError> {
        self.ready().await.map(|_| self)
    }

    async fn ready(&self) -> Result<&Ready, ResolveError> {
        let state = self.ready.get_or_init(|| self.initialize()).await;
        state.as_ref().map_err(|e| e.clone())
    }

    async fn initialize(&self) -> Result<Ready, ResolveError> {
        let trusted = Gateway::parse(&self.config.trusted_gateway)?;

        let store = self.opener.open().await.map_err(|e| {
            tracing::error!(error = %e, "failed to open record store");
            e
        })?;

        let engine = LookupEngine::new(
            store,
            Arc::clone(&self.probe),
            Arc::clone(&self.clock),
            self.config.ttl,
            RetryConfig {
                max_retries: self.config.max_retries,
            },
        );
        tracing::debug!(ttl = ?self.config.ttl, trusted = %trusted, "resolver ready");

        Ok(Ready {
            engine,
            gateways: GatewaySelector::new(trusted, self.location.clone()),
        })
    }

    /// Gateway for the current execution context.
    ///
    /// On the trusted tier this is always the configured trusted gateway.
    /// Otherwise it is derived from the current hostname, and is `None` when
    /// there is nothing to derive it from.
    pub async fn current_gateway(&self, is_trusted_tier: bool) -> Result<Option<Gateway>, ResolveError> {
        let ready = self.ready().await?;
        Ok(ready.gateways.current_gateway(is_trusted_tier))
    }

    /// Canister serving the host of `url`, or `None` for an ordinary web
    /// resource.
    pub async fn lookup(&self, url: &Url) -> Result<Option<CanisterId>, ResolveError> {
        let ready = self.ready().await?;
        ready.engine.lookup(url).await
    }

    /// The live record for `hostname`, if one is cached. Never probes.
    pub fn cached_record(&self, hostname: &str) -> Option<HostRecord> {
        match self.ready.get() {
            Some(Ok(ready)) => ready.engine.cached_record(hostname),
            _ => None,
        }
    }

    /// Engine counters; all zero before setup.
    pub fn stats(&self) -> LookupStats {
        match self.ready.get() {
            Some(Ok(ready)) => ready.engine.stats(),
            _ => LookupStats::default(),
        }
    }

    /// The engine, once setup has succeeded.
    pub fn engine(&self) -> Option<&LookupEngine> {
        match self.ready.get() {
            Some(Ok(ready)) => Some(&ready.engine),
            _ => None,
        }
    }
}

impl Default for CanisterResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CanisterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanisterResolver")
            .field("config", &self.config)
            .field("initialized", &self.ready.initialized())
            .finish()
    }
}

/// Builder for [`CanisterResolver`].
///
/// Pieces left unset are filled in from the configuration: an
/// [`HttpProbe`], a SQLite store at `store_path` (or an in-memory store),
/// and the system clock.
#[derive(Default)]
pub struct CanisterResolverBuilder {
    config: ResolverConfig,
    opener: Option<Arc<dyn OpenHostStore>>,
    probe: Option<Arc<dyn Probe>>,
    clock: Option<Arc<dyn Clock>>,
    location: Option<Arc<dyn Location>>,
}

impl CanisterResolverBuilder {
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store_opener(mut self, opener: impl OpenHostStore + 'static) -> Self {
        self.opener = Some(Arc::new(opener));
        self
    }

    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn location(mut self, location: impl Location + 'static) -> Self {
        self.location = Some(Arc::new(location));
        self
    }

    pub fn build(self) -> CanisterResolver {
        let config = self.config;

        let opener: Arc<dyn OpenHostStore> = match (self.opener, &config.store_path) {
            (Some(opener), _) => opener,
            (None, Some(path)) => Arc::new(SqliteStoreOpener::new(path)),
            (None, None) => Arc::new(MemoryStoreOpener::new()),
        };

        let probe: Arc<dyn Probe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(
                HttpProbe::new()
                    .canister_id_header(&config.canister_id_header)
                    .timeout(config.probe_timeout),
            ),
        };

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        CanisterResolver {
            opener,
            probe,
            clock,
            location: self.location,
            ready: OnceCell::new(),
            config,
        }
    }
}
