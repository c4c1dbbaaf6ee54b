//! Long-polling watcher state machine.

use super::{WatchSource, Watcher};
use crate::{client::DiscoveryError, diff, AddressSet, Error, Update, WatchIndex};
use async_trait::async_trait;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::watch;

/// Retry policy of a [`ServiceWatcher`]: after failed attempt `n` (counting
/// from zero) the watcher sleeps `base << n` before trying again, up to
/// `retries` times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Number of retries after the first attempt.
    pub retries: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            retries: 6,
        }
    }
}

impl Backoff {
    /// Delay to wait after failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Close-once cancellation flag shared between a watcher and its handles.
#[derive(Clone, Debug)]
pub struct CloseSignal {
    inner: Arc<CloseInner>,
}

#[derive(Debug)]
struct CloseInner {
    // Dropping the sender is what closes the signal.
    sender: Mutex<Option<watch::Sender<()>>>,
    receiver: watch::Receiver<()>,
}

impl CloseSignal {
    /// Creates an open signal.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(());
        Self {
            inner: Arc::new(CloseInner {
                sender: Mutex::new(Some(sender)),
                receiver,
            }),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<watch::Sender<()>>> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Closes the signal, returning `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.sender().take().is_some()
    }

    /// Determines if the signal has been closed.
    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    /// Resolves once the signal is closed.
    pub async fn closed(&self) {
        let mut receiver = self.inner.receiver.clone();
        while receiver.changed().await.is_ok() {}
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Watcher keeping track of one service's address set through long polls.
///
/// A watcher starts out with an empty set at index 0, so its first
/// [`next`](Watcher::next) reports every address as added. Every call,
/// the first included, retries failed polls according to its [`Backoff`].
/// A failed call leaves the set and index untouched.
#[derive(Debug)]
pub struct ServiceWatcher<S> {
    service: String,
    source: S,
    backoff: Backoff,
    index: WatchIndex,
    addrs: AddressSet,
    closed: CloseSignal,
}

impl<S: WatchSource> ServiceWatcher<S> {
    /// Creates a watcher for `service` polling `source`.
    pub fn new(service: impl ToString, source: S) -> Self {
        Self {
            service: service.to_string(),
            source,
            backoff: Backoff::default(),
            index: 0,
            addrs: AddressSet::new(),
            closed: CloseSignal::new(),
        }
    }

    /// Sets the watcher's retry policy.
    pub fn backoff(self, backoff: Backoff) -> Self {
        Self { backoff, ..self }
    }

    /// Gets the name of the watched service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Gets the index the next poll will be issued with.
    pub fn index(&self) -> WatchIndex {
        self.index
    }

    /// Gets the addresses observed by the last successful poll.
    pub fn addresses(&self) -> &AddressSet {
        &self.addrs
    }

    /// Gets a handle to the watcher's close signal.
    pub fn close_signal(&self) -> CloseSignal {
        self.closed.clone()
    }

    async fn poll_once(&mut self) -> Result<Vec<Update>, DiscoveryError> {
        let (addrs, index) = self.source.poll(&self.service, self.index).await?;
        let updates = diff(&self.addrs, &addrs);
        self.addrs = addrs;
        self.index = index;
        Ok(updates)
    }
}

#[async_trait]
impl<S: WatchSource> Watcher for ServiceWatcher<S> {
    async fn next(&mut self) -> Result<Vec<Update>, Error> {
        #[cfg(feature = "log")]
        tracing::debug!(
            service = %self.service,
            index = self.index,
            addresses = self.addrs.len(),
            "resolving service"
        );
        // Only checked on entry; a call already retrying runs to completion.
        if self.closed.is_closed() {
            return Err(Error::Closed {
                service: self.service.clone(),
            });
        }
        let mut attempt = 0;
        loop {
            match self.poll_once().await {
                Ok(updates) => return Ok(updates),
                Err(err) if attempt < self.backoff.retries => {
                    let delay = self.backoff.delay(attempt);
                    #[cfg(feature = "log")]
                    tracing::warn!(
                        service = %self.service,
                        attempt,
                        ?delay,
                        error = %err,
                        "retrying service resolution"
                    );
                    #[cfg(not(feature = "log"))]
                    drop(err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(Error::Watch {
                        service: self.service.clone(),
                        attempts: attempt + 1,
                        source,
                    })
                }
            }
        }
    }

    fn close(&self) -> bool {
        self.closed.close()
    }
}
