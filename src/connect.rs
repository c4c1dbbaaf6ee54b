//! Direct connections to a randomly picked instance of a service.

use crate::{
    client::{DiscoveryClient, Io},
    resolver::{resolve_once, Lookup},
    Address, Error,
};
use futures_util::future::BoxFuture;
use http::Uri;
use hyper_util::{
    client::legacy::{Builder, Client},
    rt::TokioExecutor,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};
use tokio::net::TcpStream;
use tower_service::Service;

/// Picks one of `addresses` uniformly at random.
///
/// Fails with [`Error::NoHealthyInstances`] when there is nothing to pick.
pub fn choose<'a>(
    service: &str,
    addresses: &'a [Address],
    mut rng: impl Rng,
) -> Result<&'a Address, Error> {
    if addresses.is_empty() {
        return Err(Error::NoHealthyInstances {
            service: service.to_string(),
        });
    }
    Ok(&addresses[rng.random_range(0..addresses.len())])
}

/// Connector opening each new connection to a random instance of the service
/// named by the target's host.
///
/// The service is looked up once per physical connection, so pooled clients
/// built on this connector only consult discovery when they need a new
/// connection. The target's port is ignored; instances supply their own.
#[derive(Clone)]
pub struct DiscoveryConnector<L> {
    lookup: L,
    rng: Arc<Mutex<StdRng>>,
}

impl<L: Lookup> DiscoveryConnector<L> {
    /// Creates a connector resolving services through `lookup`.
    pub fn new(lookup: L) -> Self {
        Self::with_rng(lookup, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates a connector picking instances with `rng`.
    pub fn with_rng(lookup: L, rng: StdRng) -> Self {
        Self {
            lookup,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Resolves `service` and picks one of its instances.
    pub async fn pick(&self, service: &str) -> Result<Address, Error> {
        let addresses = resolve_once(&self.lookup, service).await?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        choose(service, &addresses, &mut *rng).cloned()
    }

    /// Resolves the service named by `target`'s host and connects to a random
    /// instance of it.
    pub async fn resolve_and_connect(&self, target: &Uri) -> Result<TcpStream, Error> {
        let service = target
            .host()
            .ok_or_else(|| Error::InvalidTarget(target.clone()))?;
        let address = self.pick(service).await?;
        #[cfg(feature = "log")]
        tracing::debug!(service, address = %address, "dialing service instance");
        let connected = TcpStream::connect(address.as_str()).await;
        connected.map_err(|source| Error::Connect {
            service: service.to_string(),
            address,
            source,
        })
    }
}

impl<L> std::fmt::Debug for DiscoveryConnector<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryConnector").finish_non_exhaustive()
    }
}

impl<L: Lookup + Clone + 'static> Service<Uri> for DiscoveryConnector<L> {
    type Response = Io<TcpStream>;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, target: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.resolve_and_connect(&target).await.map(Io::new) })
    }
}

/// Builds a pooled HTTP client whose connections go to random instances of
/// the service named by each request's host, e.g. `http://billing/invoices`.
pub fn http_client<B>(discovery: DiscoveryClient) -> Client<DiscoveryConnector<DiscoveryClient>, B>
where
    B: hyper::body::Body + Send,
    B::Data: Send,
{
    Builder::new(TokioExecutor::new()).build(DiscoveryConnector::new(discovery))
}
