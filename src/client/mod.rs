//! HTTP client for the local discovery daemon.

use crate::{
    config::{self, Config},
    resolver::{Lookup, WatchSource},
    Address, AddressSet, Error, WatchIndex,
};
use async_trait::async_trait;
use bytes::Bytes;
use http::{header::HeaderMap, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::{DeserializeOwned, IgnoredAny};
use std::collections::HashMap;

mod io;
pub use io::Io;

mod socket;
use socket::UnixConnector;

/// Placeholder authority of daemon requests; the connector ignores it.
const AUTHORITY: &str = "meta";

/// Response header carrying the index to pass to the next poll.
pub const INDEX_HEADER: &str = "X-Index";

const CONFIG_PATH: &str = "/v1/config";
const SERVICES_PATH: &str = "/v1/services/";

/// Characters left alone when a service name is placed in a path.
const SERVICE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors encountered talking to the discovery daemon.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The request could not be sent or its response could not be read.
    #[error("discovery error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The daemon answered with something other than `200 OK`.
    #[error("discovery error: {status}: {body}")]
    Status {
        /// Status of the response.
        status: StatusCode,
        /// Body of the response, lossily decoded as UTF-8.
        body: String,
    },
    /// The response body was not the expected JSON.
    #[error("couldn't decode discovery response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DiscoveryError {
    fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }
}

/// A response from the discovery daemon, with its body fully read.
#[derive(Clone, Debug)]
pub struct DiscoveryResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl DiscoveryResponse {
    /// Turns any status other than `200 OK` into [`DiscoveryError::Status`].
    pub fn ok(self) -> Result<Self, DiscoveryError> {
        if self.status == StatusCode::OK {
            Ok(self)
        } else {
            Err(DiscoveryError::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DiscoveryError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parses the [`INDEX_HEADER`], if present and well-formed.
    pub fn index(&self) -> Option<WatchIndex> {
        self.headers
            .get(INDEX_HEADER)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

/// Client for the discovery daemon.
///
/// Connections to the daemon's socket are pooled; clones share the pool, so a
/// single client should be constructed and handed to every resolver.
#[derive(Clone, Debug)]
pub struct DiscoveryClient {
    http: Client<UnixConnector, Empty<Bytes>>,
}

impl DiscoveryClient {
    /// Creates a client for the daemon described by `config`.
    pub fn new(config: &Config) -> Self {
        let http = Client::builder(TokioExecutor::new())
            .build(UnixConnector::new(config.socket_path.clone()));
        Self { http }
    }

    /// Creates a client for the daemon named by the process environment.
    pub fn from_env() -> Self {
        Self::new(&Config::from_env())
    }

    /// Issues a GET for `path_and_query` against the daemon.
    ///
    /// Only failures to exchange the request surface as errors; the caller
    /// interprets the status.
    pub async fn get(&self, path_and_query: &str) -> Result<DiscoveryResponse, DiscoveryError> {
        let uri = Uri::builder()
            .scheme("http")
            .authority(AUTHORITY)
            .path_and_query(path_and_query)
            .build()
            .map_err(DiscoveryError::transport)?;
        let request = Request::get(uri)
            .body(Empty::new())
            .map_err(DiscoveryError::transport)?;
        let (parts, body) = self
            .http
            .request(request)
            .await
            .map_err(DiscoveryError::transport)?
            .into_parts();
        let body = body
            .collect()
            .await
            .map_err(DiscoveryError::transport)?
            .to_bytes();
        Ok(DiscoveryResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Decodes the process configuration into `T`.
    ///
    /// The payload comes from the `META_CONFIG` environment variable when it is
    /// set, and from the daemon otherwise.
    pub async fn config<T: DeserializeOwned>(&self) -> Result<T, Error> {
        self.config_from(config::config_override().as_deref()).await
    }

    /// Decodes `payload` into `T`, fetching it from the daemon when `None`.
    pub async fn config_from<T: DeserializeOwned>(
        &self,
        payload: Option<&str>,
    ) -> Result<T, Error> {
        let decoded = match payload {
            Some(payload) => serde_json::from_str(payload).map_err(DiscoveryError::from),
            None => {
                let response = self
                    .get(CONFIG_PATH)
                    .await
                    .and_then(DiscoveryResponse::ok)
                    .map_err(Error::Config)?;
                response.json()
            }
        };
        decoded.map_err(Error::Config)
    }
}

/// Path of a service's entry, with the long-poll index if watching.
pub(crate) fn service_path(service: &str, index: Option<WatchIndex>) -> String {
    let service = utf8_percent_encode(service, SERVICE_NAME);
    match index {
        Some(index) => format!("{SERVICES_PATH}{service}?index={index}"),
        None => format!("{SERVICES_PATH}{service}"),
    }
}

#[async_trait]
impl Lookup for DiscoveryClient {
    async fn lookup(&self, service: &str) -> Result<Vec<Address>, DiscoveryError> {
        self.get(&service_path(service, None)).await?.ok()?.json()
    }
}

#[async_trait]
impl WatchSource for DiscoveryClient {
    async fn poll(
        &self,
        service: &str,
        index: WatchIndex,
    ) -> Result<(AddressSet, WatchIndex), DiscoveryError> {
        let response = self.get(&service_path(service, Some(index))).await?.ok()?;
        let addrs: HashMap<Address, IgnoredAny> = response.json()?;
        let next = response.index().unwrap_or_else(|| {
            #[cfg(feature = "log")]
            tracing::warn!(service, "missing or malformed {INDEX_HEADER} header, using index 0");
            0
        });
        Ok((addrs.into_keys().collect(), next))
    }
}
