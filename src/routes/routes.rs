//! HTTP surface of the browser.
//!
//! ## Structure
//! - `GET /_/healthz` and `GET /_/readyz` probes
//! - everything else goes to the namespace handler:
//!   - `GET|HEAD /{*path}/` lists a directory (HTML, or JSON when asked)
//!   - `GET|HEAD /{*path}` serves an object
//!
//! Every other method on the namespace answers 405.

use axum::{Router, routing::get};

use crate::{
    handlers::{
        browse_handlers::browse,
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};

/// Build the router. The namespace has no fixed shape, so it is the fallback.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_/healthz", get(healthz))
        .route("/_/readyz", get(readyz))
        .fallback(browse)
}
