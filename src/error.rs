//! Errors surfaced by resolution and dialing.

use crate::{client::DiscoveryError, Address};
use http::Uri;

/// Errors encountered while resolving or dialing a service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A one-shot lookup failed.
    #[error("lookup of service {service} failed: {source}")]
    Lookup {
        /// Service being looked up.
        service: String,
        /// Underlying discovery failure.
        source: DiscoveryError,
    },
    /// Watching a service failed on every attempt.
    #[error("watching service {service} failed after {attempts} attempts: {source}")]
    Watch {
        /// Service being watched.
        service: String,
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Failure of the last attempt.
        source: DiscoveryError,
    },
    /// The watcher was closed before the next poll started.
    #[error("watcher for service {service} is closed")]
    Closed {
        /// Service the watcher was resolving.
        service: String,
    },
    /// The daemon reported no addresses for a service being dialed.
    #[error("couldn't dial service {service}: no healthy instances")]
    NoHealthyInstances {
        /// Service being dialed.
        service: String,
    },
    /// A connection target did not name a service.
    #[error("connection target {0} has no service host")]
    InvalidTarget(Uri),
    /// Opening a connection to a resolved address failed.
    #[error("couldn't dial service {service} at {address}: {source}")]
    Connect {
        /// Service being dialed.
        service: String,
        /// Address picked for the connection.
        address: Address,
        /// Socket error.
        source: std::io::Error,
    },
    /// Fetching the process configuration failed.
    #[error("config error: {0}")]
    Config(#[source] DiscoveryError),
    /// A balanced channel could not be constructed.
    #[error("couldn't dial service {service:?}: {reason}")]
    Dial {
        /// Service being dialed.
        service: String,
        /// Why construction failed.
        reason: String,
    },
}

impl Error {
    /// Returns the failure reported by the discovery layer, if this error
    /// originated there.
    pub fn discovery(&self) -> Option<&DiscoveryError> {
        match self {
            Self::Lookup { source, .. } | Self::Watch { source, .. } | Self::Config(source) => {
                Some(source)
            }
            _ => None,
        }
    }
}
