pub mod preflight;
pub mod tus_resumable;

pub use preflight::route_plain_options;
pub use tus_resumable::require_tus_resumable;
