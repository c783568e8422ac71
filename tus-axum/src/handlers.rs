//! One handler per protocol operation.
//!
//! Handlers only translate: headers in, engine call, status and headers out.
//! Every decision about offsets and lengths is made by the engine.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tus_core::errors::TusError;
use tus_upload::{
    AppendChunk, AppendOutcome, ByteStream, CreateOutcome, CreateUpload, InlineData, UploadId,
    UploadRecord,
};

use crate::error::error_response;
use crate::headers::{self, *};
use crate::{TusAxumError, TusAxumState};

fn body_stream(body: Body) -> ByteStream {
    Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    )
}

fn join(values: &[impl AsRef<str>]) -> Option<HeaderValue> {
    let joined = values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(",");
    HeaderValue::from_str(&joined).ok()
}

fn location(state: &TusAxumState, id: &UploadId) -> Option<HeaderValue> {
    HeaderValue::from_str(&state.options.location_for(id)).ok()
}

fn insert_opt(headers: &mut HeaderMap, name: HeaderName, value: Option<HeaderValue>) {
    if let Some(value) = value {
        headers.insert(name, value);
    }
}

fn expires(at: Option<chrono::DateTime<chrono::Utc>>) -> Option<HeaderValue> {
    at.and_then(headers::expires_value)
}

/// Unknown ids look exactly like missing uploads
fn upload_id(raw: &str) -> Result<UploadId, TusAxumError> {
    UploadId::parse(raw).ok_or_else(|| TusError::not_found(format!("Upload not found: {}", raw)).into())
}

/// OPTIONS: what this server supports
pub async fn capabilities(State(state): State<TusAxumState>) -> Response {
    let caps = state.engine.capabilities();

    let mut headers = HeaderMap::new();
    insert_opt(&mut headers, TUS_VERSION, join(&caps.supported_versions));
    insert_opt(&mut headers, TUS_EXTENSION, join(&caps.extensions));
    insert_opt(&mut headers, TUS_CHECKSUM_ALGORITHM, join(&caps.checksum_algorithms));
    headers.insert(TUS_MAX_SIZE, HeaderValue::from(caps.max_size));

    (StatusCode::NO_CONTENT, headers).into_response()
}

/// POST: create an upload, optionally with its first bytes
pub async fn create(
    State(state): State<TusAxumState>,
    request_headers: HeaderMap,
    body: Body,
) -> Result<Response, TusAxumError> {
    let length = parse_u64(&request_headers, &UPLOAD_LENGTH)?;
    let defer_length = headers::defer_length(&request_headers)?;
    let metadata = headers::metadata(&request_headers)?;
    let content_length = parse_u64(&request_headers, &header::CONTENT_LENGTH)?;
    let offset_stream = is_offset_stream(&request_headers);

    if content_length.is_some_and(|n| n > 0) && !offset_stream {
        return Err(TusError::unsupported_media_type(format!(
            "upload data must be sent as {}",
            OFFSET_OCTET_STREAM
        ))
        .into());
    }

    let inline = (offset_stream && content_length != Some(0))
        .then(|| InlineData::new(content_length, body_stream(body)));

    let request = CreateUpload {
        length,
        defer_length,
        metadata,
    };
    let outcome = state.engine.create(request, inline).await?;

    let record = outcome.record();
    let mut headers = HeaderMap::new();
    insert_opt(&mut headers, header::LOCATION, location(&state, &record.id));
    insert_opt(&mut headers, UPLOAD_EXPIRES, expires(record.expires_at));

    let response = match outcome {
        CreateOutcome::Created { .. } => (StatusCode::CREATED, headers).into_response(),
        CreateOutcome::CreatedWithData { record, .. } => {
            headers.insert(UPLOAD_OFFSET, HeaderValue::from(record.offset));
            (StatusCode::NO_CONTENT, headers).into_response()
        }
        CreateOutcome::InlineRejected { record, reason } => {
            headers.insert(UPLOAD_OFFSET, HeaderValue::from(record.offset));
            let tus = TusError::precondition_failed(format!("inline data rejected: {}", reason));
            let mut response = error_response(&tus);
            response.headers_mut().extend(headers);
            response
        }
    };
    Ok(response)
}

fn status_headers(record: &UploadRecord) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(UPLOAD_OFFSET, HeaderValue::from(record.offset));
    match record.length {
        Some(length) => {
            headers.insert(UPLOAD_LENGTH, HeaderValue::from(length));
        }
        None => {
            headers.insert(UPLOAD_DEFER_LENGTH, HeaderValue::from_static("1"));
        }
    }
    insert_opt(
        &mut headers,
        UPLOAD_METADATA,
        record
            .metadata
            .encode()
            .and_then(|encoded| HeaderValue::from_str(&encoded).ok()),
    );
    insert_opt(&mut headers, UPLOAD_EXPIRES, expires(record.expires_at));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}

/// HEAD: where does the upload stand
pub async fn status(
    State(state): State<TusAxumState>,
    Path(id): Path<String>,
) -> Result<Response, TusAxumError> {
    let id = upload_id(&id)?;
    let record = state.engine.status(&id).await?;
    Ok((StatusCode::OK, status_headers(&record)).into_response())
}

/// PATCH: append bytes at the declared offset
pub async fn append(
    State(state): State<TusAxumState>,
    Path(id): Path<String>,
    request_headers: HeaderMap,
    body: Body,
) -> Result<Response, TusAxumError> {
    if !is_offset_stream(&request_headers) {
        return Err(TusError::unsupported_media_type(format!(
            "Content-Type must be {}",
            OFFSET_OCTET_STREAM
        ))
        .into());
    }
    let offset = require_u64(&request_headers, &UPLOAD_OFFSET)?;
    let content_length = require_u64(&request_headers, &header::CONTENT_LENGTH)?;
    let length = parse_u64(&request_headers, &UPLOAD_LENGTH)?;
    let id = upload_id(&id)?;

    let chunk = AppendChunk {
        offset,
        content_length,
        length,
    };
    let outcome = state.engine.append(&id, chunk, body_stream(body)).await?;

    let mut headers = HeaderMap::new();
    headers.insert(UPLOAD_OFFSET, HeaderValue::from(outcome.offset()));

    let response = match outcome {
        AppendOutcome::Accepted(receipt) => {
            insert_opt(&mut headers, UPLOAD_EXPIRES, expires(receipt.expires_at));
            (StatusCode::NO_CONTENT, headers).into_response()
        }
        AppendOutcome::Interrupted { offset } => {
            let tus = TusError::incomplete_write(format!(
                "upload body ended early, {} bytes stored",
                offset
            ));
            let mut response = error_response(&tus);
            response.headers_mut().extend(headers);
            response
        }
    };
    Ok(response)
}

/// DELETE: remove the upload; unknown uploads are already gone
pub async fn terminate(
    State(state): State<TusAxumState>,
    Path(id): Path<String>,
) -> Result<Response, TusAxumError> {
    if let Some(id) = UploadId::parse(&id) {
        state.engine.terminate(&id).await?;
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Anything outside the upload routes
pub async fn not_found() -> TusAxumError {
    TusError::not_found("No such route").into()
}
