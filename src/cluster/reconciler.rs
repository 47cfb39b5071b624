//! The membership reconciler: the single writer of the [`Ring`].
//!
//! All probers emit their up/down edges onto one shared channel; the
//! reconciler drains it and mutates the ring. Direction is decided by the
//! ring itself - a remove that fails with [`Error::NodeNotFound`] means the
//! node was not a member, so the edge must be an up edge and the node is
//! added. Using the ring as the membership source of truth avoids carrying
//! a second state table that could drift.
use tokio::sync::mpsc;
use tracing::{event, Level};

use super::error::{Error, Result};
use super::ring::{Node, Ring};

/// Direction a membership edge resolved to.
#[derive(Debug, PartialEq)]
pub enum MembershipEdge {
    Joined,
    Left,
}

/// Consumes edge events until the channel closes. Because this is the only
/// task mutating the ring, no two mutations ever race.
pub async fn start_reconciler(ring: Ring, mut events: mpsc::Receiver<Node>) {
    while let Some(node) = events.recv().await {
        if let Err(err) = apply_edge(&ring, node) {
            event!(Level::ERROR, "failed to apply membership edge: {}", err);
        }
    }

    event!(Level::DEBUG, "membership events channel closed, reconciler exiting");
}

/// Applies a single edge event: try to remove the node, and if it was not
/// a member, add it instead.
fn apply_edge(ring: &Ring, node: Node) -> Result<MembershipEdge> {
    match ring.remove(&node) {
        Ok(()) => {
            event!(Level::INFO, "node[{}] removed from ring", node);
            Ok(MembershipEdge::Left)
        }
        Err(Error::NodeNotFound { .. }) => {
            ring.add(node.clone())?;
            event!(Level::INFO, "node[{}] added to ring", node);
            Ok(MembershipEdge::Joined)
        }
        Err(err) => Err(err),
    }
}
