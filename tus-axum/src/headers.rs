//! tus header names and request header parsing.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, Utc};
use tus_core::errors::TusError;
use tus_upload::UploadMetadata;

pub const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
pub const TUS_VERSION: HeaderName = HeaderName::from_static("tus-version");
pub const TUS_EXTENSION: HeaderName = HeaderName::from_static("tus-extension");
pub const TUS_MAX_SIZE: HeaderName = HeaderName::from_static("tus-max-size");
pub const TUS_CHECKSUM_ALGORITHM: HeaderName = HeaderName::from_static("tus-checksum-algorithm");
pub const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");
pub const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");
pub const UPLOAD_DEFER_LENGTH: HeaderName = HeaderName::from_static("upload-defer-length");
pub const UPLOAD_METADATA: HeaderName = HeaderName::from_static("upload-metadata");
pub const UPLOAD_EXPIRES: HeaderName = HeaderName::from_static("upload-expires");

/// Required content type of every body carrying upload bytes
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Headers browser clients must be able to read
pub fn exposed() -> [HeaderName; 11] {
    [
        TUS_RESUMABLE,
        TUS_VERSION,
        TUS_EXTENSION,
        TUS_MAX_SIZE,
        TUS_CHECKSUM_ALGORITHM,
        UPLOAD_OFFSET,
        UPLOAD_LENGTH,
        UPLOAD_DEFER_LENGTH,
        UPLOAD_METADATA,
        UPLOAD_EXPIRES,
        header::LOCATION,
    ]
}

fn text<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Result<Option<&'a str>, TusError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| TusError::bad_request(format!("{} is not valid ASCII", name)))
        })
        .transpose()
}

/// Optional non-negative base-10 integer header
pub fn parse_u64(headers: &HeaderMap, name: &HeaderName) -> Result<Option<u64>, TusError> {
    let Some(raw) = text(headers, name)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TusError::bad_request(format!(
            "{} must be a non-negative integer",
            name
        )));
    }
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| TusError::bad_request(format!("{} is out of range", name)))
}

pub fn require_u64(headers: &HeaderMap, name: &HeaderName) -> Result<u64, TusError> {
    parse_u64(headers, name)?.ok_or_else(|| TusError::bad_request(format!("{} is required", name)))
}

/// `Upload-Defer-Length`: absent, or exactly `1`
pub fn defer_length(headers: &HeaderMap) -> Result<bool, TusError> {
    match text(headers, &UPLOAD_DEFER_LENGTH)?.map(str::trim) {
        None => Ok(false),
        Some("1") => Ok(true),
        Some(_) => Err(TusError::bad_request("Upload-Defer-Length must be 1")),
    }
}

pub fn metadata(headers: &HeaderMap) -> Result<UploadMetadata, TusError> {
    let raw = text(headers, &UPLOAD_METADATA)?;
    UploadMetadata::decode(raw).map_err(|e| TusError::bad_request(e.to_string()))
}

/// Whether `Content-Type` is `application/offset+octet-stream` (parameters ignored)
pub fn is_offset_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(OFFSET_OCTET_STREAM))
}

/// Client speaks the protocol version this server does
pub fn is_supported_version(headers: &HeaderMap) -> bool {
    headers
        .get(TUS_RESUMABLE)
        .is_some_and(|value| value == tus_upload::TUS_VERSION)
}

/// `Upload-Expires` value, RFC 7231 date
pub fn format_expires(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn expires_value(at: DateTime<Utc>) -> Option<HeaderValue> {
    HeaderValue::from_str(&format_expires(at)).ok()
}
