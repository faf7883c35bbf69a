//! Resolved-host record storage.
//!
//! The lookup engine keeps its own in-memory cache; a [`HostStore`] is the
//! durable layer behind it so classifications survive a restart. The store
//! is opened once, through an [`OpenHostStore`], when the resolver is set up.
//!
//! | Implementation | Backing | Use |
//! |----------------|---------|-----|
//! | [`SqliteHostStore`] | `rusqlite` file or memory database | default with a `store_path` |
//! | [`MemoryHostStore`] | `DashMap` | no `store_path`, tests |

mod memory;
mod record;
mod sqlite;

pub use memory::{MemoryHostStore, MemoryStoreOpener};
pub use record::HostRecord;
pub use sqlite::{SqliteHostStore, SqliteStoreOpener};

use crate::base::error::ResolveError;
use std::{future::Future, pin::Pin, sync::Arc};

/// Alias for the `Future` type returned by store operations.
pub type StoreFuture<T> = Pin<Box<dyn Future<Output = Result<T, ResolveError>> + Send>>;

/// Keyed record storage, one record per hostname.
pub trait HostStore: Send + Sync {
    /// Fetch the record for `hostname`, regardless of its age.
    fn get(&self, hostname: &str) -> StoreFuture<Option<HostRecord>>;

    /// Insert or replace the record keyed by `record.hostname`.
    fn put(&self, record: HostRecord) -> StoreFuture<()>;
}

/// Opens a [`HostStore`]. Called at most once per resolver.
pub trait OpenHostStore: Send + Sync {
    fn open(&self) -> StoreFuture<Arc<dyn HostStore>>;
}

impl<S: HostStore + ?Sized> HostStore for Arc<S> {
    fn get(&self, hostname: &str) -> StoreFuture<Option<HostRecord>> {
        (**self).get(hostname)
    }

    fn put(&self, record: HostRecord) -> StoreFuture<()> {
        (**self).put(record)
    }
}

impl<O: OpenHostStore + ?Sized> OpenHostStore for Arc<O> {
    fn open(&self) -> StoreFuture<Arc<dyn HostStore>> {
        (**self).open()
    }
}
