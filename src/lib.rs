//! shardkv is a horizontally partitioned in-memory key/value service.
//! A fleet of stateless-per-node stores sits behind a routing front-end that
//! maps each key to exactly one store using consistent hashing and reshapes
//! the hash ring as nodes come and go under active health probing.
pub mod cluster;
pub mod error;
pub mod router;
pub mod server;
pub mod store;
pub mod telemetry;

#[cfg(test)]
extern crate quickcheck;

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
