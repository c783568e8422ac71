//! tusrs server: configuration and wiring for the `tus-server` binary.

pub mod app;

pub use app::{build, load_config, ServerSettings, ENV_PREFIX};
