//! tus-axum: tus 1.0.0 protocol over axum.
//!
//! Builds an axum `Router` that maps the five protocol exchanges onto an
//! [`UploadEngine`](tus_upload::UploadEngine).

pub mod app;
pub mod handlers;
pub mod headers;
pub mod middlewares;
pub mod state;
mod error;
pub use error::TusAxumError;
pub use state::{TusAxumState, TusOptions};

pub use app::{router, tus, TusAxumApp};
