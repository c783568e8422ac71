//! tus-core: transport-agnostic core for tusrs.
//!
//! Holds the pieces every other crate agrees on: the protocol error
//! taxonomy (with its status codes) and the key/value configuration store.

pub mod config;
pub mod errors;

pub use config::{TusConfig, TusConfigSnapshot};
pub use errors::{ErrorKind, TusError, TusResult};
