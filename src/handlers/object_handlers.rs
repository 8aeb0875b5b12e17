//! HTTP handlers for the store and signed routes.
//! Path uploads stream the request body straight through; storage concerns
//! live in `StorageService`.

use crate::{
    errors::GatewayError,
    models::{key::KeyError, object::StoredObject},
    services::storage_service::StorageService,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::io;

/// IMF-fixdate, the only date format emitted in HTTP headers.
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// `POST store/{filename}` — legacy upload of a bare filename.
///
/// Older clients need the content length up front, so this route reads the
/// whole body before forwarding it.
pub async fn upload_by_filename(
    State(service): State<StorageService>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, GatewayError> {
    if filename.contains('/') {
        return Err(KeyError::InvalidSegment(filename).into());
    }

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|err| GatewayError::BadRequest(format!("failed to read request body: {}", err)))?;

    let url = service
        .upload_by_filename(
            &filename,
            bytes,
            content_type(&headers),
            content_length(&headers)?,
        )
        .await?;

    Ok(plain_text(url.to_string()))
}

/// `PUT store/{*path}` — upload under a caller-chosen key.
pub async fn upload_by_path(
    State(service): State<StorageService>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, GatewayError> {
    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));

    let url = service
        .upload_by_path(
            &path,
            stream,
            content_type(&headers),
            content_length(&headers)?,
        )
        .await?;

    Ok(plain_text(url.to_string()))
}

/// `GET signed/{*path}` — presigned download URL, no upload.
pub async fn presigned_url(
    State(service): State<StorageService>,
    Path(path): Path<String>,
) -> Result<Response, GatewayError> {
    let url = service.presigned_url(&path).await?;
    Ok(plain_text(url.to_string()))
}

/// `GET store/{*path}` — object bytes with the content type recorded at
/// upload. HEAD is answered from here too, minus the body.
///
/// `If-None-Match` / `If-Modified-Since` that still hold yield `304` with
/// validators only.
pub async fn download_object(
    State(service): State<StorageService>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let object = service.download(&path).await?;

    if not_modified(&headers, &object) {
        let mut response = Response::new(Body::empty());
        set_validators(response.headers_mut(), &object);
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        return Ok(response);
    }

    let mut response = Response::new(Body::empty());
    set_object_headers(response.headers_mut(), &object);
    *response.body_mut() = Body::from(object.content);
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when it is absent.
fn not_modified(headers: &HeaderMap, object: &StoredObject) -> bool {
    if let Some(value) = headers.get(header::IF_NONE_MATCH) {
        let Some(etag) = object.etag.as_deref() else {
            return false;
        };
        return value
            .to_str()
            .map(|list| etag_matches(list, etag))
            .unwrap_or(false);
    }

    let since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|d| d.with_timezone(&Utc));
    match (since, object.last_modified) {
        (Some(since), Some(modified)) => modified.timestamp() <= since.timestamp(),
        _ => false,
    }
}

/// Weak comparison against a comma separated `If-None-Match` list.
fn etag_matches(list: &str, etag: &str) -> bool {
    list.split(',').map(str::trim).any(|candidate| {
        candidate == "*"
            || candidate
                .trim_start_matches("W/")
                .trim_matches('"')
                .eq(etag)
    })
}

fn plain_text(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

fn content_length(headers: &HeaderMap) -> Result<Option<u64>, GatewayError> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| GatewayError::BadRequest("malformed content-length header".into()))
}

fn set_object_headers(headers: &mut HeaderMap, object: &StoredObject) {
    set_validators(headers, object);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(object.content_length),
    );
}

fn set_validators(headers: &mut HeaderMap, object: &StoredObject) {
    if let Some(etag) = object.etag.as_ref() {
        let quoted = format!("\"{}\"", etag);
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }
    if let Some(modified) = object.last_modified {
        if let Ok(value) = HeaderValue::from_str(&modified.format(HTTP_DATE).to_string()) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}
