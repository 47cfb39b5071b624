//! The per-node key/value store, implemented as a single-writer actor.
//!
//! Every operation places a request message on the store's mailbox and
//! waits for the reply; one serving loop drains the mailbox and is the only
//! task that ever touches the map, so mutations need no locking and
//! "check absence then insert" is atomic by construction. That makes the
//! create-only contract of [`Store::set`] a structural property rather than
//! something a lock discipline has to defend.
//!
//! Shutdown is one-way: once the shutdown future passed to [`Store::new`]
//! completes, the mailbox is closed, residual messages are answered with
//! [`Error::StoreClosed`], and every later call fails the same way without
//! blocking.
use std::collections::HashMap;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{event, Level};

use crate::error::{Error, Result};

/// Enough in-flight requests to keep HTTP handlers from contending on the
/// mailbox; serialization comes from the single serving loop, not from the
/// channel capacity.
const MAILBOX_CAPACITY: usize = 32;

enum Request {
    Get {
        key: String,
        reply: oneshot::Sender<Result<Bytes>>,
    },
    Set {
        key: String,
        value: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Update {
        key: String,
        value: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Delete {
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

impl Request {
    /// Answers the caller with [`Error::StoreClosed`]. Used to release
    /// callers whose messages were accepted but not served before shutdown.
    fn reject_closed(self) {
        match self {
            Request::Get { reply, .. } => {
                let _ = reply.send(Err(Error::StoreClosed));
            }
            Request::Set { reply, .. } | Request::Update { reply, .. } => {
                let _ = reply.send(Err(Error::StoreClosed));
            }
            Request::Delete { reply, .. } => {
                let _ = reply.send(Err(Error::StoreClosed));
            }
        }
    }
}

/// Handle to one in-memory key/value actor. Cheap to clone; all clones
/// talk to the same serving loop.
#[derive(Debug, Clone)]
pub struct Store {
    mailbox: mpsc::Sender<Request>,
}

impl Store {
    /// Spawns the serving loop and returns a handle to it. The first
    /// completion of `shutdown` transitions the store to its terminal
    /// closed state; the store is never reopened.
    pub fn new(shutdown: impl Future<Output = ()> + Send + 'static) -> Self {
        let (mailbox, serving) = mpsc::channel(MAILBOX_CAPACITY);

        let actor = Actor {
            items: HashMap::new(),
            mailbox: serving,
        };
        tokio::spawn(actor.run(shutdown));

        Self { mailbox }
    }

    /// Retrieves the value stored under `key`. The returned [`Bytes`] is a
    /// shared view; holding on to it cannot disturb the store.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let (reply, response) = oneshot::channel();
        self.request(Request::Get {
            key: key.to_owned(),
            reply,
        })
        .await?;
        response.await.map_err(|_| Error::StoreClosed)?
    }

    /// Creates `key`. Strictly create: an existing key fails with
    /// [`Error::KeyAlreadyExists`], never an overwrite.
    pub async fn set(&self, key: String, value: Bytes) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.request(Request::Set { key, value, reply }).await?;
        response.await.map_err(|_| Error::StoreClosed)?
    }

    /// Overwrites the value under an existing `key`. Strictly overwrite: an
    /// absent key fails with [`Error::KeyNotFound`].
    pub async fn update(&self, key: String, value: Bytes) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.request(Request::Update { key, value, reply }).await?;
        response.await.map_err(|_| Error::StoreClosed)?
    }

    /// Deletes `key`, failing with [`Error::KeyNotFound`] if absent.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.request(Request::Delete {
            key: key.to_owned(),
            reply,
        })
        .await?;
        response.await.map_err(|_| Error::StoreClosed)?
    }

    async fn request(&self, request: Request) -> Result<()> {
        // a closed mailbox means the serving loop is gone for good
        self.mailbox
            .send(request)
            .await
            .map_err(|_| Error::StoreClosed)
    }
}

struct Actor {
    items: HashMap<String, Bytes>,
    mailbox: mpsc::Receiver<Request>,
}

impl Actor {
    async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                message = self.mailbox.recv() => match message {
                    Some(request) => self.serve(request),
                    // every handle dropped; nothing left to serve
                    None => return,
                },
            }
        }

        event!(Level::INFO, "store shutting down, draining mailbox");
        self.mailbox.close();
        while let Some(request) = self.mailbox.recv().await {
            request.reject_closed();
        }
    }

    fn serve(&mut self, request: Request) {
        match request {
            Request::Get { key, reply } => {
                let result = self
                    .items
                    .get(&key)
                    .cloned()
                    .ok_or(Error::KeyNotFound { key });
                let _ = reply.send(result);
            }
            Request::Set { key, value, reply } => {
                let result = if self.items.contains_key(&key) {
                    Err(Error::KeyAlreadyExists { key })
                } else {
                    self.items.insert(key, value);
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Request::Update { key, value, reply } => {
                let result = if self.items.contains_key(&key) {
                    self.items.insert(key, value);
                    Ok(())
                } else {
                    Err(Error::KeyNotFound { key })
                };
                let _ = reply.send(result);
            }
            Request::Delete { key, reply } => {
                let result = match self.items.remove(&key) {
                    Some(_) => Ok(()),
                    None => Err(Error::KeyNotFound { key }),
                };
                let _ = reply.send(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::oneshot::{channel, Receiver};

    use super::Store;
    use crate::error::Error;

    async fn shutdown(receiver: Receiver<()>) {
        let _ = receiver.await;
    }

    fn open_store() -> (Store, tokio::sync::oneshot::Sender<()>) {
        let (sender, receiver) = channel();
        (Store::new(shutdown(receiver)), sender)
    }

    #[tokio::test]
    async fn set_get_update_delete_round_trip() {
        let (store, _shutdown) = open_store();

        store
            .set("a key".to_string(), Bytes::from("a value"))
            .await
            .unwrap();
        assert_eq!(store.get("a key").await.unwrap(), Bytes::from("a value"));

        store
            .update("a key".to_string(), Bytes::from("another value"))
            .await
            .unwrap();
        assert_eq!(
            store.get("a key").await.unwrap(),
            Bytes::from("another value")
        );

        store.delete("a key").await.unwrap();
        let err = store.get("a key").await.err().unwrap();
        assert_eq!(
            err,
            Error::KeyNotFound {
                key: "a key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn set_is_strictly_create() {
        let (store, _shutdown) = open_store();

        store
            .set("a key".to_string(), Bytes::from("first"))
            .await
            .unwrap();
        let err = store
            .set("a key".to_string(), Bytes::from("second"))
            .await
            .err()
            .unwrap();

        assert_eq!(
            err,
            Error::KeyAlreadyExists {
                key: "a key".to_string()
            }
        );
        // the losing set must not have clobbered the value
        assert_eq!(store.get("a key").await.unwrap(), Bytes::from("first"));
    }

    #[tokio::test]
    async fn update_requires_existing_key() {
        let (store, _shutdown) = open_store();

        let err = store
            .update("missing".to_string(), Bytes::from("value"))
            .await
            .err()
            .unwrap();
        assert!(err.is_key_not_found());
    }

    #[tokio::test]
    async fn delete_requires_existing_key() {
        let (store, _shutdown) = open_store();

        let err = store.delete("missing").await.err().unwrap();
        assert!(err.is_key_not_found());
    }

    #[tokio::test]
    async fn empty_value_round_trips() {
        let (store, _shutdown) = open_store();

        store.set("empty".to_string(), Bytes::new()).await.unwrap();
        assert_eq!(store.get("empty").await.unwrap(), Bytes::new());
    }

    /// Two overlapping creates of the same key: exactly one wins, the other
    /// observes [`Error::KeyAlreadyExists`], regardless of interleaving.
    #[tokio::test]
    async fn concurrent_set_creates_once() {
        let (store, _shutdown) = open_store();

        let first = store.clone();
        let second = store.clone();
        let (a, b) = tokio::join!(
            first.set("contended".to_string(), Bytes::from("a")),
            second.set("contended".to_string(), Bytes::from("b")),
        );

        assert_ne!(a.is_ok(), b.is_ok(), "exactly one set must win");
        let loser = if a.is_ok() { b } else { a };
        assert_eq!(
            loser.err().unwrap(),
            Error::KeyAlreadyExists {
                key: "contended".to_string()
            }
        );

        // the winner's value is visible
        let value = store.get("contended").await.unwrap();
        assert!(value == Bytes::from("a") || value == Bytes::from("b"));
    }

    /// Once any call returns [`Error::StoreClosed`], every later call on the
    /// same store does too.
    #[tokio::test]
    async fn closed_is_terminal() {
        let (store, shutdown_sender) = open_store();

        store
            .set("a key".to_string(), Bytes::from("a value"))
            .await
            .unwrap();

        drop(shutdown_sender);

        // the actor races the signal; wait until the first StoreClosed
        loop {
            match store.get("a key").await {
                Err(Error::StoreClosed) => break,
                Ok(_) => tokio::task::yield_now().await,
                Err(err) => panic!("unexpected error {:?}", err),
            }
        }

        assert_eq!(store.get("a key").await.err().unwrap(), Error::StoreClosed);
        assert_eq!(
            store
                .set("another".to_string(), Bytes::from("v"))
                .await
                .err()
                .unwrap(),
            Error::StoreClosed
        );
        assert_eq!(
            store
                .update("a key".to_string(), Bytes::from("v"))
                .await
                .err()
                .unwrap(),
            Error::StoreClosed
        );
        assert_eq!(store.delete("a key").await.err().unwrap(), Error::StoreClosed);
    }

    #[tokio::test]
    async fn monotonic_visibility() {
        let (store, _shutdown) = open_store();

        store
            .set("watched".to_string(), Bytes::from("v1"))
            .await
            .unwrap();
        for _ in 0..10 {
            assert_eq!(store.get("watched").await.unwrap(), Bytes::from("v1"));
        }

        store
            .update("watched".to_string(), Bytes::from("v2"))
            .await
            .unwrap();
        for _ in 0..10 {
            assert_eq!(store.get("watched").await.unwrap(), Bytes::from("v2"));
        }
    }
}
