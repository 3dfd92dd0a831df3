//! Health & readiness handlers.
//!
//! - GET /_/healthz  -> simple liveness ("ok")
//! - GET /_/readyz   -> readiness that asks the storage backend to check itself
//!
//! Both live under `/_/` so they never shadow a mounted path.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::state::AppState;

/// `GET /_/healthz`
///
/// Very small liveness probe. Always 200 and never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /_/readyz`
///
/// HTTP 200 when the backend check passes, HTTP 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let backend = match state.backend.check().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => {
            warn!(err = %err, "readiness check failed");
            CheckStatus {
                ok: false,
                error: Some(err.to_string()),
            }
        }
    };

    let status = if backend.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut checks = HashMap::new();
    checks.insert("backend", backend);

    let body = ReadyResponse {
        status: if status == StatusCode::OK {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
