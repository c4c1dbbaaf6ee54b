#![deny(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

/*!
Rust client for resolving services through the local `meta` discovery daemon.

# Introduction

The discovery daemon listens on a unix domain socket (`/run/meta.sock` unless
`META_SOCKET` says otherwise) and maps service names to `host:port`
addresses. It answers three requests:

```text
GET /v1/services/billing          => ["10.0.0.1:80","10.0.0.2:80"]
GET /v1/services/billing?index=5  => {"10.0.0.1:80":{},"10.0.0.2:80":{}}   X-Index: 6
GET /v1/config                    => arbitrary JSON
```

The indexed form is a long poll: the daemon holds the request until the
service's address set moves past the given index.

`meta-resolver` offers two ways of using these answers:

- A [`ServiceWatcher`] keeps a live view of a service, turning each long poll
  into a list of [`Update`]s and retrying failed polls with exponential
  backoff. [`balancer::dial`] feeds a watcher into a round-robin gRPC channel.
- [`resolve_once`] fetches the current list a single time, and
  [`DiscoveryConnector`] uses it to open each new connection of a pooled HTTP
  client to a random instance of the service.

```no_run
# #[tokio::main]
# async fn main() -> Result<(), meta_resolver::Error> {
use meta_resolver::{DiscoveryClient, MetaResolver, Resolver, Watcher};
let client = DiscoveryClient::from_env();
let mut watcher = MetaResolver::new(client).resolve("billing");
loop {
    for update in watcher.next().await? {
        println!("{:?} {}", update.op, update.address);
    }
}
# }
```

All requests share the connection pool of a single [`DiscoveryClient`], which
should be created once and cloned into every resolver and connector.
*/

mod client;
pub use client::{DiscoveryClient, DiscoveryError, DiscoveryResponse, Io, INDEX_HEADER};

pub mod config;
pub use config::Config;

mod connect;
pub use connect::{choose, http_client, DiscoveryConnector};

mod error;
pub use error::Error;

pub mod resolver;
pub use resolver::{
    resolve_once, Backoff, CloseSignal, Lookup, MetaResolver, Resolver, ServiceWatcher,
    WatchSource, Watcher,
};

mod update;
pub use update::{diff, Address, AddressSet, Op, Update, WatchIndex};

#[cfg(feature = "grpc")]
pub mod balancer;
