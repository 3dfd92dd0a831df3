//! Request router for the virtual namespace.
//! Paths ending in `/` are directory listings; anything else is an object.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::Response,
};
use chrono::{DurationRound, TimeDelta, Utc};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    errors::AppError,
    render::html::render_listing,
    services::{http_date::format_http_date, listing::DELIMITER},
    state::AppState,
};

/// Query params accepted on directory requests.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    /// `json` selects the JSON listing.
    pub format: Option<String>,
}

/// GET/HEAD on any path of the virtual namespace.
pub async fn browse(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<BrowseQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    info!(
        path = uri.path(),
        method = %method,
        forwarded_for = header_str(&headers, "x-forwarded-for"),
        user_agent = header_str(&headers, header::USER_AGENT.as_str()),
        "request"
    );

    if method != Method::GET && method != Method::HEAD {
        warn!(method = %method, "method not allowed");
        return Err(AppError::method_not_allowed());
    }

    let Ok(path) = percent_decode_str(uri.path()).decode_utf8() else {
        return Err(AppError::not_found("not found"));
    };

    if state.options.favicon_not_found && path == "/favicon.ico" {
        return Err(AppError::not_found("not found"));
    }

    if path.ends_with(DELIMITER) {
        index(&state, &path, &method, &headers, &query).await
    } else {
        state.objects.serve(&path, &method, &headers).await
    }
}

/// Directory listing as HTML or JSON. HEAD answers 200 without listing.
async fn index(
    state: &AppState,
    path: &str,
    method: &Method,
    headers: &HeaderMap,
    query: &BrowseQuery,
) -> Result<Response, AppError> {
    let json = state.options.json && wants_json(headers, query);
    let now = Utc::now();

    let mut resp_headers = HeaderMap::new();
    resp_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(if json {
            "application/json"
        } else {
            "text/html; charset=utf-8"
        }),
    );
    // Listings show relative timestamps, so they go stale by the minute.
    let minute = now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now);
    if let Ok(value) = HeaderValue::from_str(&format_http_date(minute)) {
        resp_headers.insert(header::LAST_MODIFIED, value);
    }
    resp_headers.insert(
        header::CACHE_CONTROL,
        state.options.default_cache_control.clone(),
    );
    resp_headers.insert(header::VARY, HeaderValue::from_static("Accept"));

    if method == Method::HEAD {
        let mut response = Response::new(Body::empty());
        *response.headers_mut() = resp_headers;
        return Ok(response);
    }

    let listing = state.listing.list(path).await;

    let body = if json {
        serde_json::to_vec(&listing.entries).map_err(|err| {
            error!(path = %path, err = %err, "failed to encode listing");
            AppError::internal("failed to encode listing")
        })?
    } else {
        let readme = match listing.readme.as_ref().filter(|_| state.options.readme) {
            Some(attrs) => match state.readmes.fetch(attrs).await {
                Ok(markdown) => Some(markdown),
                Err(err) => {
                    error!(bucket = %attrs.bucket, name = %attrs.name, err = %err, "failed to fetch readme");
                    None
                }
            },
            None => None,
        };
        render_listing(path, &listing.entries, readme.as_deref(), now).into_bytes()
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = resp_headers;
    Ok(response)
}

fn wants_json(headers: &HeaderMap, query: &BrowseQuery) -> bool {
    if query.format.as_deref() == Some("json") {
        return true;
    }
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|media| {
            media
                .split(';')
                .next()
                .is_some_and(|m| m.trim().eq_ignore_ascii_case("application/json"))
        })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
