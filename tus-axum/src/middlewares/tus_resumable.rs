use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tus_core::errors::TusError;

use crate::error::error_response;
use crate::headers::{self, TUS_VERSION};

/// Refuse requests that do not speak our protocol version.
///
/// OPTIONS is exempt so clients can discover the version first.
pub async fn require_tus_resumable(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS || headers::is_supported_version(req.headers()) {
        return next.run(req).await;
    }

    tracing::debug!(method = %req.method(), uri = %req.uri(), "Rejected request with unsupported Tus-Resumable");
    let mut response = error_response(&TusError::precondition_failed(format!(
        "Tus-Resumable must be {}",
        tus_upload::TUS_VERSION
    )));
    response
        .headers_mut()
        .insert(TUS_VERSION, HeaderValue::from_static(tus_upload::TUS_VERSION));
    response
}
