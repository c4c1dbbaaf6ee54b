//! Round-robin gRPC channels kept up to date by a service watcher.

use crate::{
    resolver::{Resolver, Watcher},
    Address, Error, Op,
};
use tokio::sync::mpsc::Sender;
use tonic::transport::{Channel, Endpoint};
use tower::discover::Change;

/// Capacity of the queue carrying endpoint changes to the balancer.
const CHANGE_CAPACITY: usize = 64;

/// Opens a load-balanced channel to `service`.
///
/// # Panics
///
/// Panics when the channel cannot be constructed, which happens when called
/// outside of a tokio runtime. Use [`try_dial_with`] to handle that case.
pub fn dial<R>(resolver: &R, service: &str) -> Channel
where
    R: Resolver,
    R::Watcher: 'static,
{
    dial_with(resolver, service, |endpoint| endpoint)
}

/// Opens a load-balanced channel to `service`, passing every endpoint through
/// `configure` (e.g. to set timeouts) before it joins the balancer.
///
/// # Panics
///
/// See [`dial`].
pub fn dial_with<R, F>(resolver: &R, service: &str, configure: F) -> Channel
where
    R: Resolver,
    R::Watcher: 'static,
    F: Fn(Endpoint) -> Endpoint + Send + 'static,
{
    try_dial_with(resolver, service, configure).unwrap_or_else(|err| panic!("{err}"))
}

/// Fallible version of [`dial_with`].
pub fn try_dial_with<R, F>(resolver: &R, service: &str, configure: F) -> Result<Channel, Error>
where
    R: Resolver,
    R::Watcher: 'static,
    F: Fn(Endpoint) -> Endpoint + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|err| Error::Dial {
        service: service.to_string(),
        reason: err.to_string(),
    })?;
    let (channel, changes) = Channel::balance_channel(CHANGE_CAPACITY);
    let watcher = resolver.resolve(service);
    runtime.spawn(forward(service.to_string(), watcher, changes, configure));
    Ok(channel)
}

/// Feeds the updates produced by `watcher` to a balancer as endpoint changes.
///
/// Returns, closing the watcher, once the balancer hangs up, the watcher is
/// closed, or the watcher gives up on the service.
pub async fn forward<W, F>(
    service: String,
    mut watcher: W,
    changes: Sender<Change<Address, Endpoint>>,
    configure: F,
) where
    W: Watcher,
    F: Fn(Endpoint) -> Endpoint,
{
    loop {
        let updates = match watcher.next().await {
            Ok(updates) => updates,
            Err(Error::Closed { .. }) => break,
            Err(err) => {
                #[cfg(feature = "log")]
                tracing::error!(%service, error = %err, "stopped watching service");
                #[cfg(not(feature = "log"))]
                drop(err);
                break;
            }
        };
        for update in updates {
            let change = match update.op {
                Op::Add => match endpoint(&update.address) {
                    Ok(endpoint) => Change::Insert(update.address, configure(endpoint)),
                    Err(err) => {
                        #[cfg(feature = "log")]
                        tracing::warn!(
                            %service,
                            address = %update.address,
                            error = %err,
                            "skipping address"
                        );
                        #[cfg(not(feature = "log"))]
                        drop(err);
                        continue;
                    }
                },
                Op::Delete => Change::Remove(update.address),
            };
            if changes.send(change).await.is_err() {
                // Balancer dropped
                watcher.close();
                return;
            }
        }
    }
    watcher.close();
    #[cfg(not(feature = "log"))]
    drop(service);
}

fn endpoint(address: &str) -> Result<Endpoint, tonic::transport::Error> {
    Endpoint::from_shared(format!("http://{address}"))
}
