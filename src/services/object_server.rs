//! Serves single objects with validators, conditional requests and streaming.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::Response,
};
use chrono::{SubsecRound, Utc};
use futures::TryStreamExt;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::{
    backend::StorageBackend,
    errors::AppError,
    models::attributes::ObjectAttributes,
    services::{
        http_date::{format_http_date, parse_http_date},
        mount_table::MountTable,
    },
};

pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=60";

/// Time the response was produced; never cached.
pub static X_FETCHED_AT: HeaderName = HeaderName::from_static("x-fetched-at");

#[derive(Clone)]
pub struct ObjectServer {
    mounts: Arc<MountTable>,
    backend: Arc<dyn StorageBackend>,
    default_cache_control: HeaderValue,
}

impl ObjectServer {
    pub fn new(
        mounts: Arc<MountTable>,
        backend: Arc<dyn StorageBackend>,
        default_cache_control: HeaderValue,
    ) -> Self {
        Self {
            mounts,
            backend,
            default_cache_control,
        }
    }

    /// Serve the object at `path` for a GET or HEAD request.
    ///
    /// Unresolvable paths and attribute lookup failures are 404. A failure to
    /// open the payload is 500. Once streaming has started, errors only
    /// truncate the body.
    pub async fn serve(
        &self,
        path: &str,
        method: &Method,
        request_headers: &HeaderMap,
    ) -> Result<Response, AppError> {
        let mount = self
            .mounts
            .resolve(path)
            .ok_or_else(|| AppError::not_found("not found"))?;
        let name = mount.backend_name(path);

        let attrs = self
            .backend
            .object_attributes(&mount.bucket, &name)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    debug!(bucket = %mount.bucket, object = %name, "object not found");
                } else {
                    error!(bucket = %mount.bucket, object = %name, err = %err, "failed to get object attributes");
                }
                AppError::not_found("not found")
            })?;

        let mut response = Response::new(Body::empty());
        set_validators(response.headers_mut(), &attrs);

        if is_not_modified(request_headers, &attrs) {
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            return Ok(response);
        }

        let headers = response.headers_mut();
        set_object_headers(headers, &attrs, &self.default_cache_control);
        set_header_if_not_empty(headers, X_FETCHED_AT.clone(), &format_http_date(Utc::now()));

        if method == Method::HEAD {
            return Ok(response);
        }

        info!(bucket = %mount.bucket, object = %name, "serving object");
        let object = self
            .backend
            .open_object(&mount.bucket, &name)
            .await
            .map_err(|err| {
                error!(bucket = %mount.bucket, object = %name, err = %err, "failed to read object");
                AppError::internal("failed to read object")
            })?;

        // The payload may have changed since the attributes were read.
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(object.attrs.size));

        let bucket = mount.bucket.clone();
        let stream = ReaderStream::new(object.reader).inspect_err(move |err| {
            error!(bucket = %bucket, object = %name, err = %err, "failed to write object");
        });
        *response.body_mut() = Body::from_stream(stream);

        Ok(response)
    }
}

/// `ETag` and `Last-Modified`, sent with both full and 304 responses.
fn set_validators(headers: &mut HeaderMap, attrs: &ObjectAttributes) {
    set_header_if_not_empty(headers, header::ETAG, &format!("\"{}\"", attrs.etag));
    set_header_if_not_empty(
        headers,
        header::LAST_MODIFIED,
        &format_http_date(attrs.updated),
    );
}

fn set_object_headers(
    headers: &mut HeaderMap,
    attrs: &ObjectAttributes,
    default_cache_control: &HeaderValue,
) {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(attrs.size));
    set_optional_header(headers, header::CONTENT_TYPE, attrs.content_type.as_deref());
    set_optional_header(headers, header::CONTENT_ENCODING, attrs.content_encoding.as_deref());
    set_optional_header(
        headers,
        header::CONTENT_DISPOSITION,
        attrs.content_disposition.as_deref(),
    );
    if !set_optional_header(headers, header::CACHE_CONTROL, attrs.cache_control.as_deref()) {
        headers.insert(header::CACHE_CONTROL, default_cache_control.clone());
    }

    for (key, value) in &attrs.metadata {
        match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => {
                set_header_if_not_empty(headers, name, value);
            }
            Err(_) => warn!(key = %key, "skipping metadata with invalid header name"),
        }
    }
}

fn set_optional_header(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) -> bool {
    value.is_some_and(|value| set_header_if_not_empty(headers, name, value))
}

/// Insert `name: value` unless the value is empty or not a valid header value.
fn set_header_if_not_empty(headers: &mut HeaderMap, name: HeaderName, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
            true
        }
        Err(_) => {
            warn!(header = %name, "skipping invalid header value");
            false
        }
    }
}

/// Evaluate `If-None-Match`, or failing that `If-Modified-Since`.
///
/// A malformed `If-Modified-Since` is ignored.
pub fn is_not_modified(request: &HeaderMap, attrs: &ObjectAttributes) -> bool {
    if let Some(value) = request.get(header::IF_NONE_MATCH).filter(|v| !v.is_empty()) {
        let tag = value.to_str().unwrap_or_default();
        let tag = tag.strip_prefix("W/").unwrap_or(tag).trim_matches('"');
        return tag == attrs.etag;
    }

    if let Some(value) = request.get(header::IF_MODIFIED_SINCE) {
        match value.to_str().ok().and_then(parse_http_date) {
            Some(since) => return attrs.updated.trunc_subsecs(0) <= since,
            None => debug!(value = ?value, "ignoring malformed If-Modified-Since"),
        }
    }

    false
}
