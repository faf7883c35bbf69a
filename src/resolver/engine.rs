//! Lookup engine: memory cache, persisted records, in-flight dedup and the
//! probe itself.
//!
//! Per hostname the engine moves through `Absent -> InFlight -> Resolved`,
//! and a resolved record falls back to `Absent` once its age reaches the TTL.
//! The in-flight map is keyed by hostname and holds one shared outcome; the
//! `DashMap` entry lock makes check-and-insert atomic, so the first batch of
//! concurrent callers still produces a single probe.

use crate::base::clock::Clock;
use crate::base::error::ResolveError;
use crate::base::neterror::NetError;
use crate::canister::CanisterId;
use crate::probe::retry::{head_with_retry, RetryConfig};
use crate::probe::{Probe, ProbeResponse};
use crate::store::{HostRecord, HostStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type LookupOutcome = Result<Option<CanisterId>, ResolveError>;
type SharedLookup = Shared<BoxFuture<'static, LookupOutcome>>;

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStats {
    /// Lookups answered from the in-memory cache.
    pub cache_hits: usize,
    /// Lookups answered by adopting a persisted record.
    pub store_hits: usize,
    /// Probes issued (a retried probe counts once).
    pub probes: usize,
    /// Lookups that attached to a probe already in flight.
    pub joined: usize,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicUsize,
    store_hits: AtomicUsize,
    probes: AtomicUsize,
    joined: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LookupStats {
        LookupStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    cache: DashMap<String, HostRecord>,
    in_flight: DashMap<String, SharedLookup>,
    store: Arc<dyn HostStore>,
    probe: Arc<dyn Probe>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    retry: RetryConfig,
    counters: Counters,
}

/// Hostname to canister classification, cached and deduplicated.
///
/// The memory cache holds one record per hostname ever classified. Expired
/// records are not evicted; they stay until the next lookup of that host
/// replaces them, so the map grows with the number of distinct hosts seen.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct LookupEngine {
    inner: Arc<Inner>,
}

impl LookupEngine {
    pub fn new(
        store: Arc<dyn HostStore>,
        probe: Arc<dyn Probe>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: DashMap::new(),
                in_flight: DashMap::new(),
                store,
                probe,
                clock,
                ttl,
                retry,
                counters: Counters::default(),
            }),
        }
    }

    /// Classify the host of `url`.
    ///
    /// `Ok(None)` is an ordinary web resource. Concurrent calls for the same
    /// hostname share one probe and observe the same outcome.
    pub async fn lookup(&self, url: &Url) -> LookupOutcome {
        let hostname = hostname_of(url)?;

        if let Some(record) = self.inner.fresh_cached(&hostname) {
            Counters::bump(&self.inner.counters.cache_hits);
            tracing::debug!(hostname = %hostname, canister = ?record.canister_id, "cache hit");
            return Ok(record.canister_id);
        }

        let pending = match self.inner.in_flight.entry(hostname.clone()) {
            Entry::Occupied(entry) => {
                Counters::bump(&self.inner.counters.joined);
                tracing::debug!(hostname = %hostname, "joining in-flight lookup");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                // A probe may have settled between the cache check and
                // taking the entry lock.
                if let Some(record) = self.inner.fresh_cached(&hostname) {
                    Counters::bump(&self.inner.counters.cache_hits);
                    return Ok(record.canister_id);
                }
                let pending = Inner::spawn_resolution(&self.inner, hostname.clone(), url.clone());
                entry.insert(pending.clone());
                pending
            }
        };

        pending.await
    }

    /// The live record for `hostname`, without touching the store or network.
    pub fn cached_record(&self, hostname: &str) -> Option<HostRecord> {
        self.inner.fresh_cached(&hostname.to_ascii_lowercase())
    }

    /// Number of hostnames in the memory cache, expired or not.
    pub fn cached_hosts(&self) -> usize {
        self.inner.cache.len()
    }

    /// Number of hostnames with a probe outstanding.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn stats(&self) -> LookupStats {
        self.inner.counters.snapshot()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}

impl std::fmt::Debug for LookupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupEngine")
            .field("ttl", &self.inner.ttl)
            .field("retry", &self.inner.retry)
            .field("cached", &self.inner.cache.len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

impl Inner {
    fn fresh_cached(&self, hostname: &str) -> Option<HostRecord> {
        let record = self.cache.get(hostname)?;
        if record.is_fresh(self.clock.now_millis(), self.ttl) {
            Some(record.clone())
        } else {
            None
        }
    }

    /// Run the resolution on its own task so it settles even if every
    /// caller awaiting it goes away.
    fn spawn_resolution(this: &Arc<Self>, hostname: String, url: Url) -> SharedLookup {
        let inner = Arc::clone(this);
        let task_host = hostname.clone();
        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                hostname: task_host.clone(),
            };
            inner.resolve(&task_host, url).await
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(hostname = %hostname, error = %e, "lookup task failed");
                    Err(ResolveError::network(hostname, NetError::ConnectionAborted))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn resolve(&self, hostname: &str, url: Url) -> LookupOutcome {
        if let Some(record) = self.adopt_from_store(hostname).await {
            return Ok(record.canister_id);
        }

        Counters::bump(&self.counters.probes);
        tracing::debug!(hostname = %hostname, url = %url, "probing host");

        let response = head_with_retry(&*self.probe, &url, &self.retry)
            .await
            .map_err(|e| {
                tracing::warn!(hostname = %hostname, error = %e, "probe failed");
                ResolveError::network(hostname, e)
            })?;

        let canister_id = classify(hostname, &response)?;
        let gateway_hint = canister_id
            .as_ref()
            .map(|_| url.origin().ascii_serialization());
        let record = HostRecord::new(
            hostname,
            canister_id.clone(),
            gateway_hint,
            self.clock.now_millis(),
        );

        tracing::debug!(hostname = %hostname, canister = ?canister_id, status = %response.status(), "host classified");
        self.cache.insert(hostname.to_string(), record.clone());

        if let Err(e) = self.store.put(record).await {
            tracing::warn!(hostname = %hostname, error = %e, "failed to persist host record");
        }

        Ok(canister_id)
    }

    /// A persisted record still within TTL, copied into the memory cache.
    async fn adopt_from_store(&self, hostname: &str) -> Option<HostRecord> {
        let record = match self.store.get(hostname).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(hostname = %hostname, error = %e, "record store read failed");
                return None;
            }
        };

        if !record.is_fresh(self.clock.now_millis(), self.ttl) {
            return None;
        }

        Counters::bump(&self.counters.store_hits);
        tracing::debug!(hostname = %hostname, canister = ?record.canister_id, "adopted stored record");
        self.cache.insert(hostname.to_string(), record.clone());
        Some(record)
    }
}

/// Removes the in-flight entry when the resolution task ends, including on
/// panic. Dropped after the cache write.
struct InFlightGuard {
    inner: Arc<Inner>,
    hostname: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.hostname);
    }
}

/// Map a probe response to a classification.
fn classify(hostname: &str, response: &ProbeResponse) -> LookupOutcome {
    if !response.status().is_success() {
        return Ok(None);
    }

    let Some(raw) = response.canister_id() else {
        return Ok(None);
    };

    CanisterId::from_text(raw).map(Some).map_err(|e| {
        tracing::warn!(hostname = %hostname, value = %raw, error = %e, "malformed canister id header");
        ResolveError::malformed(hostname, raw, e)
    })
}

fn hostname_of(url: &Url) -> Result<String, ResolveError> {
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_ascii_lowercase()),
        _ => Err(ResolveError::InvalidUrl(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::clock::ManualClock;
    use crate::probe::Probing;
    use crate::store::MemoryHostStore;
    use http::StatusCode;
    use std::sync::Mutex;

    const CANISTER: &str = "rdmx6-jaaaa-aaaaa-aaadq-cai";

    struct StaticProbe {
        response: ProbeResponse,
        calls: AtomicUsize,
    }

    impl StaticProbe {
        fn new(status: StatusCode, header: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                response: ProbeResponse::new(status, header.map(str::to_string)),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Probe for StaticProbe {
        fn head(&self, _url: Url) -> Probing {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    struct Fixture {
        engine: LookupEngine,
        store: MemoryHostStore,
        clock: Arc<ManualClock>,
    }

    fn fixture(probe: Arc<dyn Probe>) -> Fixture {
        let store = MemoryHostStore::new();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let engine = LookupEngine::new(
            Arc::new(store.clone()),
            probe,
            clock.clone(),
            Duration::from_secs(3600),
            RetryConfig::default(),
        );
        Fixture {
            engine,
            store,
            clock,
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_classify() {
        let ok = ProbeResponse::new(StatusCode::OK, Some(CANISTER.to_string()));
        assert_eq!(
            classify("a.io", &ok).unwrap().unwrap().to_text(),
            CANISTER
        );

        let no_header = ProbeResponse::status_only(StatusCode::NO_CONTENT);
        assert_eq!(classify("a.io", &no_header).unwrap(), None);

        let server_error =
            ProbeResponse::new(StatusCode::INTERNAL_SERVER_ERROR, Some(CANISTER.to_string()));
        assert_eq!(classify("a.io", &server_error).unwrap(), None);

        let redirect = ProbeResponse::new(StatusCode::FOUND, Some("garbage".to_string()));
        assert_eq!(classify("a.io", &redirect).unwrap(), None);

        let malformed = ProbeResponse::new(StatusCode::OK, Some("invalid-canister-format".into()));
        assert!(classify("a.io", &malformed).unwrap_err().is_malformed());
    }

    #[test]
    fn test_hostname_is_lowercased() {
        assert_eq!(
            hostname_of(&url("https://WWW.Example.IO/x")).unwrap(),
            "www.example.io"
        );
        assert!(hostname_of(&url("data:text/plain,hi")).is_err());
    }

    #[tokio::test]
    async fn test_positive_record_carries_gateway_hint() {
        let probe = StaticProbe::new(StatusCode::OK, Some(CANISTER));
        let f = fixture(probe.clone());

        let id = f
            .engine
            .lookup(&url("https://www.customdappdomain.io/app"))
            .await
            .unwrap();
        assert_eq!(id.unwrap().to_text(), CANISTER);

        let stored = f.store.snapshot("www.customdappdomain.io").unwrap();
        assert_eq!(
            stored.gateway_hint.as_deref(),
            Some("https://www.customdappdomain.io")
        );
        assert_eq!(f.engine.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_negative_record_cached_and_persisted() {
        let probe = StaticProbe::new(StatusCode::OK, None);
        let f = fixture(probe.clone());
        let target = url("https://www.example.com");

        assert_eq!(f.engine.lookup(&target).await.unwrap(), None);
        assert_eq!(f.engine.lookup(&target).await.unwrap(), None);

        assert_eq!(probe.calls(), 1);
        let stored = f.store.snapshot("www.example.com").unwrap();
        assert!(!stored.is_canister());
        assert!(stored.gateway_hint.is_none());
    }

    #[tokio::test]
    async fn test_expired_record_is_replaced() {
        let probe = StaticProbe::new(StatusCode::OK, Some(CANISTER));
        let f = fixture(probe.clone());
        let target = url("https://www.customdappdomain.io");

        f.engine.lookup(&target).await.unwrap();
        f.clock.advance(Duration::from_secs(60 * 60));
        assert!(f.engine.cached_record("www.customdappdomain.io").is_none());

        f.engine.lookup(&target).await.unwrap();
        assert_eq!(probe.calls(), 2);
        assert_eq!(f.engine.stats().probes, 2);
    }

    #[tokio::test]
    async fn test_expired_records_stay_until_replaced() {
        let probe = StaticProbe::new(StatusCode::OK, None);
        let f = fixture(probe.clone());

        f.engine.lookup(&url("https://a.example.io")).await.unwrap();
        f.engine.lookup(&url("https://b.example.io")).await.unwrap();
        f.clock.advance(Duration::from_secs(2 * 60 * 60));

        assert!(f.engine.cached_record("a.example.io").is_none());
        assert_eq!(f.engine.cached_hosts(), 2);

        f.engine.lookup(&url("https://a.example.io")).await.unwrap();
        assert_eq!(f.engine.cached_hosts(), 2);
        assert!(f.engine.cached_record("a.example.io").is_some());
        assert!(f.engine.cached_record("b.example.io").is_none());
    }

    #[tokio::test]
    async fn test_stale_store_record_is_not_adopted() {
        let probe = StaticProbe::new(StatusCode::OK, None);
        let f = fixture(probe.clone());
        let two_hours_ago = f.clock.now_millis() - 2 * 60 * 60 * 1_000;
        f.store
            .put(HostRecord::new(
                "old.example.io",
                Some(CanisterId::from_text(CANISTER).unwrap()),
                None,
                two_hours_ago,
            ))
            .await
            .unwrap();

        let id = f.engine.lookup(&url("https://old.example.io")).await.unwrap();
        assert_eq!(id, None);
        assert_eq!(probe.calls(), 1);
        assert_eq!(f.engine.stats().store_hits, 0);
    }

    struct FailingPutStore {
        puts: Mutex<usize>,
    }

    impl HostStore for FailingPutStore {
        fn get(&self, _hostname: &str) -> crate::store::StoreFuture<Option<HostRecord>> {
            Box::pin(async { Ok::<_, ResolveError>(None::<HostRecord>) })
        }

        fn put(&self, _record: HostRecord) -> crate::store::StoreFuture<()> {
            *self.puts.lock().unwrap() += 1;
            Box::pin(async { Err::<(), _>(ResolveError::store("disk full")) })
        }
    }

    #[tokio::test]
    async fn test_store_write_failure_keeps_memory_record() {
        let probe = StaticProbe::new(StatusCode::OK, Some(CANISTER));
        let store = Arc::new(FailingPutStore {
            puts: Mutex::new(0),
        });
        let engine = LookupEngine::new(
            store.clone(),
            probe.clone(),
            Arc::new(ManualClock::new(0)),
            Duration::from_secs(3600),
            RetryConfig::default(),
        );
        let target = url("https://www.customdappdomain.io");

        assert!(engine.lookup(&target).await.unwrap().is_some());
        assert!(engine.lookup(&target).await.unwrap().is_some());
        assert_eq!(probe.calls(), 1);
        assert_eq!(*store.puts.lock().unwrap(), 1);
    }
}
