//! Connector pinning every request to the daemon's unix socket.

use super::io::Io;
use futures_util::future::BoxFuture;
use http::Uri;
use std::{
    io,
    path::PathBuf,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::net::UnixStream;
use tower_service::Service;

/// Dials the configured socket regardless of the request's authority.
#[derive(Clone, Debug)]
pub struct UnixConnector {
    path: Arc<PathBuf>,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }
}

impl Service<Uri> for UnixConnector {
    type Response = Io<UnixStream>;
    type Error = io::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let path = self.path.clone();
        Box::pin(async move { UnixStream::connect(path.as_path()).await.map(Io::new) })
    }
}
