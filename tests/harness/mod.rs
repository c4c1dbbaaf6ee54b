// Shared test infrastructure — not every test binary uses every item.
#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    convert::Infallible,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request, Response};
use hyper_util::rt::TokioIo;
use meta_resolver::{Config, DiscoveryClient, INDEX_HEADER};
use tempfile::TempDir;
use tokio::{net::UnixListener, task::JoinHandle};

/// Canned response of the mock daemon.
#[derive(Clone, Debug)]
pub struct Reply {
    /// Status code
    pub status: u16,
    /// Value of the index header, if any
    pub index: Option<&'static str>,
    /// Response body
    pub body: &'static str,
}

impl Reply {
    /// A `200 OK` carrying `body`.
    pub const fn ok(body: &'static str) -> Self {
        Self {
            status: 200,
            index: None,
            body,
        }
    }

    /// A `200 OK` carrying `body` and an index header.
    pub const fn indexed(index: &'static str, body: &'static str) -> Self {
        Self {
            status: 200,
            index: Some(index),
            body,
        }
    }

    /// An error response.
    pub const fn status(status: u16, body: &'static str) -> Self {
        Self {
            status,
            index: None,
            body,
        }
    }
}

#[derive(Default)]
struct Routes {
    /// Replies per path and query. The last reply of each route repeats.
    replies: HashMap<String, VecDeque<Reply>>,
    /// Every path and query requested, in order.
    requests: Vec<String>,
}

impl Routes {
    fn reply(&mut self, path_and_query: &str) -> Reply {
        self.requests.push(path_and_query.to_string());
        match self.replies.get_mut(path_and_query) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Reply::status(404, "no such route"),
        }
    }
}

/// Minimal stand-in for the discovery daemon, serving canned replies on a
/// unix socket inside a temporary directory.
pub struct MockDaemon {
    dir: TempDir,
    routes: Arc<Mutex<Routes>>,
    task: JoinHandle<()>,
}

impl MockDaemon {
    /// Starts serving `routes`, each a path and query with the replies to give
    /// in order.
    pub async fn spawn<const N: usize>(routes: [(&str, Vec<Reply>); N]) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir for daemon socket");
        let listener = UnixListener::bind(dir.path().join("meta.sock"))
            .expect("failed to bind daemon socket");
        let routes = Arc::new(Mutex::new(Routes {
            replies: routes
                .into_iter()
                .map(|(route, replies)| (route.to_string(), replies.into()))
                .collect(),
            requests: Vec::new(),
        }));

        let state = routes.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |request: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(respond(&state, &request)) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { dir, routes, task }
    }

    /// Path of the daemon's socket.
    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("meta.sock")
    }

    /// Client configured to talk to this daemon.
    pub fn client(&self) -> DiscoveryClient {
        DiscoveryClient::new(&Config::new(self.socket_path()))
    }

    /// Paths and queries requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.routes.lock().unwrap().requests.clone()
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn respond(routes: &Mutex<Routes>, request: &Request<Incoming>) -> Response<Full<Bytes>> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let reply = routes.lock().unwrap().reply(path_and_query);
    let mut response = Response::builder().status(reply.status);
    if let Some(index) = reply.index {
        response = response.header(INDEX_HEADER, index);
    }
    response
        .body(Full::new(Bytes::from_static(reply.body.as_bytes())))
        .unwrap()
}
