//! Error type for ring membership operations
use std::fmt::Display;

use super::ring::Node;

/// Enum that represents Errors for ring operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Add of a node whose virtual points are already on the ring
    NodeAlreadyPresent { node: Node },
    /// Remove of a node that owns no virtual point. The reconciler matches on
    /// this variant to tell "node was down -> bring it up" apart from
    /// "node was up -> take it down"
    NodeNotFound { node: Node },
    /// Find on a ring with no members
    RingEmpty,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

/// Type alias for [`std::result::Result`] with the cluster [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;
