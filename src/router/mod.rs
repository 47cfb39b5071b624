//! The routing front-end.
//!
//! Every keyed request hits `/store?key=<k>`; the router resolves the
//! owning backend through the [`Ring`] and reverse-proxies the request to
//! it, preserving method, path, query, headers and streaming the body in
//! both directions. In parallel, one health prober per configured backend
//! feeds up/down edges to the reconciler, which is the only ring writer -
//! a request therefore resolves against whichever consistent snapshot
//! `find` happened to read.
//!
//! `GET /nodes` reports the ring membership the router is currently
//! routing against.
use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{event, Level};

use crate::cluster::prober::start_prober;
use crate::cluster::reconciler::start_reconciler;
use crate::cluster::ring::{Node, Ring};
use crate::error::{Error, Result};

use self::config::RouterConfig;

pub mod config;

/// All probers share one edge-events channel; edges are rare (membership
/// changes only) so a small buffer is plenty.
const MEMBERSHIP_EVENTS_CAPACITY: usize = 16;

pub struct Router {
    listener: TcpListener,
    context: Context,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
struct Context {
    ring: Ring,
    client: reqwest::Client,
}

impl Router {
    /// Seeds the ring with every configured backend, spawns the probers and
    /// the reconciler, and binds the listener. The probers will take any
    /// backend that is actually unreachable off the ring within one probe
    /// interval.
    pub async fn new(config: RouterConfig) -> Result<Self> {
        config.validate()?;

        let nodes = config.nodes();
        let ring = Ring::new(&nodes, config.virtual_points).map_err(|err| {
            Error::InvalidConfig {
                reason: err.to_string(),
            }
        })?;

        let (events_sender, events_receiver) = mpsc::channel(MEMBERSHIP_EVENTS_CAPACITY);
        let mut tasks = Vec::with_capacity(nodes.len() + 1);
        for node in nodes {
            tasks.push(tokio::spawn(start_prober(
                node,
                config.probe_config(),
                events_sender.clone(),
            )));
        }
        drop(events_sender);
        tasks.push(tokio::spawn(start_reconciler(ring.clone(), events_receiver)));

        // in-flight requests to a backend that just died should fail over
        // to 502 on the probe timeout horizon instead of hanging
        let client = reqwest::Client::builder()
            .timeout(config.probe_config().timeout)
            .build()
            .map_err(|err| Error::InvalidConfig {
                reason: format!("unable to build proxy client: {}", err),
            })?;

        let listener = TcpListener::bind(format!("0.0.0.0:{}", config.listen_port)).await?;

        Ok(Self {
            listener,
            context: Context { ring, client },
            tasks,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` completes, then reaps the prober and
    /// reconciler tasks.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        event!(
            Level::INFO,
            "router listening on {}",
            self.listener.local_addr()?
        );

        let app = axum::Router::new()
            .route("/store", any(forward))
            .route("/nodes", get(membership))
            .with_state(self.context);

        let served = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        for task in self.tasks.iter() {
            task.abort();
        }

        Ok(served?)
    }
}

#[derive(Debug, Deserialize)]
struct StoreQuery {
    key: Option<String>,
}

async fn forward(
    State(context): State<Context>,
    Query(query): Query<StoreQuery>,
    request: Request,
) -> Response {
    event!(
        Level::DEBUG,
        "routing request method[{}] query[{:?}]",
        request.method(),
        query
    );

    let Some(key) = query.key.filter(|key| !key.is_empty()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let node = match context.ring.find(key.as_bytes()) {
        Ok(node) => node,
        // no backend is reachable right now
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };

    proxy(&context.client, node, request).await
}

/// Forwards `request` to `node` verbatim and streams the upstream response
/// back. Every upstream transport failure, including the proxy timeout,
/// surfaces as 502.
async fn proxy(client: &reqwest::Client, node: Node, request: Request) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("http://{}{}", node, path_and_query);

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    // the upstream connection gets its own Host
    headers.remove(header::HOST);

    let upstream = client
        .request(parts.method, url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(err) => {
            event!(Level::WARN, "upstream node[{}] failed: {}", node, err);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut builder = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers().iter() {
        builder = builder.header(name, value);
    }

    match builder.body(axum::body::Body::from_stream(upstream.bytes_stream())) {
        Ok(response) => response,
        Err(err) => {
            event!(Level::ERROR, "unable to rebuild upstream response: {}", err);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct MembershipResponse {
    nodes: Vec<Node>,
}

async fn membership(State(context): State<Context>) -> Json<MembershipResponse> {
    Json(MembershipResponse {
        nodes: context.ring.nodes(),
    })
}
