//! The backend node HTTP surface.
//!
//! Each backend exposes CRUD over one [`Store`]:
//!   - `GET /store?key=k` reads a value
//!   - `PUT /store?key=k` upserts: strictly-create first, falling through
//!     to strictly-overwrite when the key already exists. 201 signals a
//!     create, 200 an overwrite; the client never needs to know which path
//!     it took. A `StoreClosed` from the create attempt short-circuits to
//!     500 without trying the overwrite.
//!   - `DELETE /store?key=k` removes a key
//!   - `GET /health` answers 200 while the process serves; the router's
//!     probers hit this
//! Requests with a missing or empty `key` are rejected with 400. Other
//! methods on `/store` get a 405 from the method router.
use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{event, Level};

use crate::error::{Error, Result};
use crate::store::Store;

use self::config::NodeConfig;

pub mod config;

pub struct Server {
    listener: TcpListener,
    store: Store,
}

impl Server {
    /// Binds the listener for the configured port. Port 0 is allowed and
    /// picks a free port - useful in tests together with [`Server::local_addr`].
    pub async fn new(config: NodeConfig, store: Store) -> Result<Self> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` completes.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        event!(
            Level::INFO,
            "node listening on {}",
            self.listener.local_addr()?
        );

        let app = axum::Router::new()
            .route(
                "/store",
                get(get_value).put(put_value).delete(delete_value),
            )
            .route("/health", get(health))
            .with_state(self.store);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StoreQuery {
    key: Option<String>,
}

impl StoreQuery {
    /// The key is required and must be non-empty.
    fn require_key(self) -> Option<String> {
        self.key.filter(|key| !key.is_empty())
    }
}

async fn get_value(State(store): State<Store>, Query(query): Query<StoreQuery>) -> Response {
    event!(Level::DEBUG, "serving request method[GET] query[{:?}]", query);

    let Some(key) = query.require_key() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match store.get(&key).await {
        Ok(value) => (StatusCode::OK, value).into_response(),
        Err(Error::KeyNotFound { .. }) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn put_value(
    State(store): State<Store>,
    Query(query): Query<StoreQuery>,
    body: Bytes,
) -> Response {
    event!(Level::DEBUG, "serving request method[PUT] query[{:?}]", query);

    let Some(key) = query.require_key() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match store.set(key.clone(), body.clone()).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(Error::KeyAlreadyExists { .. }) => match store.update(key, body).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn delete_value(State(store): State<Store>, Query(query): Query<StoreQuery>) -> Response {
    event!(
        Level::DEBUG,
        "serving request method[DELETE] query[{:?}]",
        query
    );

    let Some(key) = query.require_key() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match store.delete(&key).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(Error::KeyNotFound { .. }) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}
