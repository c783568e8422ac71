use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tus_core::errors::{ErrorKind, TusError};
use tus_upload::UploadError;

use crate::headers::UPLOAD_OFFSET;

#[derive(Debug)]
pub struct TusAxumError(pub anyhow::Error);

impl From<anyhow::Error> for TusAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<TusError> for TusAxumError {
    fn from(e: TusError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<UploadError> for TusAxumError {
    fn from(e: UploadError) -> Self {
        TusError::from(e).into()
    }
}

impl IntoResponse for TusAxumError {
    fn into_response(self) -> Response {
        // If it's a TusError (even if wrapped by anyhow contexts), keep its kind and data
        if let Some(tus) = self.0.chain().find_map(|e| e.downcast_ref::<TusError>()) {
            if tus.kind == ErrorKind::GeneralError {
                tracing::error!(error = ?self.0, "Upload request failed");
            }
            return error_response(&tus.sanitize_for_client());
        }

        // Fallback: wrap any non-TusError as a TusError::GeneralError
        tracing::error!(error = ?self.0, "Unhandled error");
        error_response(&TusError::general_error(self.0.to_string()).sanitize_for_client())
    }
}

/// JSON error body, plus the server's offset when the error carries one
pub(crate) fn error_response(tus: &TusError) -> Response {
    let status = StatusCode::from_u16(tus.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(tus.to_json())).into_response();

    if let Some(offset) = tus
        .data
        .as_ref()
        .and_then(|data| data.get("offset"))
        .and_then(|offset| offset.as_u64())
    {
        response
            .headers_mut()
            .insert(UPLOAD_OFFSET, HeaderValue::from(offset));
    }
    response
}
