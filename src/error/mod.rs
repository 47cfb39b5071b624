//! This module defines the client visible errors that can be returned by a
//! shardkv store node. Ring membership errors live in [`crate::cluster::error`].

use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

/// Error enum with all possible variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Variant returned for Get/Update/Delete requests when the key is not present
    KeyNotFound { key: String },
    /// Variant returned by Set when the key is already in use. Set is strictly
    /// create - overwriting goes through Update
    KeyAlreadyExists { key: String },
    /// Returned by every operation once the store shutdown signal fired. Terminal.
    StoreClosed,
    /// Returned during bootstrap if any configuration is invalid
    InvalidConfig { reason: String },
    /// Self explanatory
    Io { reason: String },
}

impl Error {
    /// Returns true if this is an instance of a [`Error::KeyNotFound`] variant
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound { .. })
    }

    /// Returns true if this is an instance of a [`Error::StoreClosed`] variant
    pub fn is_store_closed(&self) -> bool {
        matches!(self, Error::StoreClosed)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}
