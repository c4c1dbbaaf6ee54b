//! Resolution of service names into addresses.

use crate::{client::DiscoveryError, Address, AddressSet, Error, Update, WatchIndex};
use async_trait::async_trait;

mod watcher;
pub use watcher::{Backoff, CloseSignal, ServiceWatcher};

/// Represents the ability to fetch a service's current addresses in one shot.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Gets the addresses currently registered for `service`, in whatever
    /// order (and with whatever duplicates) the source reports them.
    async fn lookup(&self, service: &str) -> Result<Vec<Address>, DiscoveryError>;
}

/// Represents the ability to long-poll a service's address set.
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// Waits for the address set of `service` to move past `index`, returning
    /// the new set along with the index to poll with next.
    async fn poll(
        &self,
        service: &str,
        index: WatchIndex,
    ) -> Result<(AddressSet, WatchIndex), DiscoveryError>;
}

#[async_trait]
impl<T: Lookup + ?Sized> Lookup for std::sync::Arc<T> {
    async fn lookup(&self, service: &str) -> Result<Vec<Address>, DiscoveryError> {
        (**self).lookup(service).await
    }
}

#[async_trait]
impl<T: WatchSource + ?Sized> WatchSource for std::sync::Arc<T> {
    async fn poll(
        &self,
        service: &str,
        index: WatchIndex,
    ) -> Result<(AddressSet, WatchIndex), DiscoveryError> {
        (**self).poll(service, index).await
    }
}

/// Starts watchers for services.
pub trait Resolver {
    /// Watcher produced by the resolver.
    type Watcher: Watcher;

    /// Starts resolving `service`.
    fn resolve(&self, service: &str) -> Self::Watcher;
}

/// Live view of one service's addresses.
#[async_trait]
pub trait Watcher: Send {
    /// Waits for the next change to the service's addresses and returns the
    /// updates describing it.
    ///
    /// Must not be called concurrently on the same watcher.
    async fn next(&mut self) -> Result<Vec<Update>, Error>;

    /// Closes the watcher, returning whether this call did so. Later calls
    /// are no-ops.
    fn close(&self) -> bool;
}

/// [`Resolver`] producing [`ServiceWatcher`]s over a shared source.
#[derive(Clone, Debug)]
pub struct MetaResolver<S> {
    source: S,
    backoff: Backoff,
}

impl<S: WatchSource + Clone> MetaResolver<S> {
    /// Creates a resolver polling `source` with the default backoff.
    pub fn new(source: S) -> Self {
        Self {
            source,
            backoff: Backoff::default(),
        }
    }

    /// Sets the backoff used by watchers created afterwards.
    pub fn backoff(self, backoff: Backoff) -> Self {
        Self { backoff, ..self }
    }
}

impl<S: WatchSource + Clone> Resolver for MetaResolver<S> {
    type Watcher = ServiceWatcher<S>;

    fn resolve(&self, service: &str) -> Self::Watcher {
        ServiceWatcher::new(service, self.source.clone()).backoff(self.backoff)
    }
}

/// Fetches the addresses of `service` once, without retrying.
///
/// ```no_run
/// # async fn run() -> Result<(), meta_resolver::Error> {
/// use meta_resolver::{resolve_once, DiscoveryClient};
/// let client = DiscoveryClient::from_env();
/// let addresses = resolve_once(&client, "billing").await?;
/// # Ok(())
/// # }
/// ```
pub async fn resolve_once<L: Lookup + ?Sized>(
    lookup: &L,
    service: &str,
) -> Result<Vec<Address>, Error> {
    lookup
        .lookup(service)
        .await
        .map_err(|source| Error::Lookup {
            service: service.to_string(),
            source,
        })
}
