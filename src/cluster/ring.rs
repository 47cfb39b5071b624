//! The consistent-hash ring: an ordered mapping from hash positions to
//! backend [`Node`]s that answers "which node owns this key?".
//!
//! The hash space is `[0, 2^32)` and should be viewed as circular. Every
//! member contributes `R` virtual points at positions
//! `H("host:port#i")` for `i in [0, R)`; a key hashed to position `p` is
//! owned by the node of the smallest virtual point at or after `p`,
//! wrapping back to the first point (the successor rule). Spreading each
//! node over `R` points keeps the key distribution close to uniform and
//! means that adding or removing one member only remaps roughly a
//! `1/|members|` fraction of the keys.
//!
//! Membership mutations come from a single writer (the reconciler) while
//! lookups happen concurrently on every routed request, so the point
//! vector is published as an immutable snapshot behind an [`Arc`]:
//! writers rebuild and swap, readers clone the [`Arc`] out of a briefly
//! held lock and search without contention. A reader always observes
//! either the pre- or post-mutation ring, never a torn intermediate.
use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use murmur3::murmur3_32;
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Number of virtual points each node contributes to the ring unless
/// configured otherwise.
pub const DEFAULT_VIRTUAL_POINTS: usize = 100;

/// Hash function contract: deterministic, uniform over u32, and used for
/// both virtual point placement and key lookup. Never mix two of these on
/// one ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Default [`HashFn`] for the ring.
pub fn murmur3_hash(key: &[u8]) -> u32 {
    // murmur3 over an in-memory cursor cannot fail
    murmur3_32(&mut Cursor::new(key), 0).unwrap()
}

/// A backend node identity. Equality is the `(host, port)` pair verbatim;
/// this is a value type with no lifecycle of its own, copied freely.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Node {
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One of the `R` hash positions a node contributes to the ring.
///
/// The derived ordering is `(position, host, port)`, which is what breaks
/// ties when two distinct nodes collide on the same position and keeps
/// lookups deterministic across processes and restarts.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct VirtualPoint {
    position: u32,
    node: Node,
}

/// The ring handle. Cheap to clone; all clones observe the same membership.
#[derive(Debug, Clone)]
pub struct Ring {
    snapshot: Arc<RwLock<Arc<Vec<VirtualPoint>>>>,
    virtual_points: usize,
    hash_fn: HashFn,
}

impl Ring {
    /// Builds a ring containing `nodes`, each contributing `virtual_points`
    /// points (clamped to at least 1). Fails with
    /// [`Error::NodeAlreadyPresent`] on a duplicate node in the input.
    pub fn new(nodes: &[Node], virtual_points: usize) -> Result<Self> {
        Self::with_hash_fn(nodes, virtual_points, murmur3_hash)
    }

    /// Same as [`Ring::new`] but with an injected hash function. Mostly
    /// useful for tests that need known positions.
    pub fn with_hash_fn(nodes: &[Node], virtual_points: usize, hash_fn: HashFn) -> Result<Self> {
        let ring = Self {
            snapshot: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            virtual_points: virtual_points.max(1),
            hash_fn,
        };

        for node in nodes {
            ring.add(node.clone())?;
        }

        Ok(ring)
    }

    /// Inserts all virtual points for `node`, keeping the snapshot sorted.
    /// Fails with [`Error::NodeAlreadyPresent`] if the node is already a
    /// member.
    pub fn add(&self, node: Node) -> Result<()> {
        let mut guard = self.write_lock();
        if guard.iter().any(|point| point.node == node) {
            return Err(Error::NodeAlreadyPresent { node });
        }

        let mut points = guard.as_ref().clone();
        for i in 0..self.virtual_points {
            points.push(VirtualPoint {
                position: (self.hash_fn)(format!("{}#{}", node, i).as_bytes()),
                node: node.clone(),
            });
        }
        points.sort();

        *guard = Arc::new(points);
        Ok(())
    }

    /// Removes every virtual point belonging to `node`. Fails with
    /// [`Error::NodeNotFound`] if the node is not a member.
    pub fn remove(&self, node: &Node) -> Result<()> {
        let mut guard = self.write_lock();
        if !guard.iter().any(|point| point.node == *node) {
            return Err(Error::NodeNotFound { node: node.clone() });
        }

        let points: Vec<VirtualPoint> = guard
            .iter()
            .filter(|point| point.node != *node)
            .cloned()
            .collect();

        *guard = Arc::new(points);
        Ok(())
    }

    /// Returns the node owning `key` per the successor rule, or
    /// [`Error::RingEmpty`] if the ring has no members.
    pub fn find(&self, key: &[u8]) -> Result<Node> {
        let points = self.read_snapshot();
        if points.is_empty() {
            return Err(Error::RingEmpty);
        }

        let position = (self.hash_fn)(key);
        let index = points.partition_point(|point| point.position < position) % points.len();
        Ok(points[index].node.clone())
    }

    /// Current distinct membership, sorted by `(host, port)`.
    pub fn nodes(&self) -> Vec<Node> {
        let points = self.read_snapshot();
        points
            .iter()
            .map(|point| point.node.clone())
            .collect::<BTreeSet<Node>>()
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.read_snapshot().is_empty()
    }

    fn read_snapshot(&self) -> Arc<Vec<VirtualPoint>> {
        // writers only ever swap in complete snapshots, so even a poisoned
        // lock holds a consistent ring
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Arc<Vec<VirtualPoint>>> {
        match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
