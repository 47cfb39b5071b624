//! Module that contains the ring membership machinery: the consistent-hash
//! ring itself plus the health probers and the reconciler that mutates the
//! ring based on their verdicts.
pub mod error;
pub mod prober;
pub mod reconciler;
pub mod ring;
