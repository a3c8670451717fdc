//! Defines the HTTP surface of the upload service.
//!
//! ## Structure
//! - `GET  /up`           liveness probe, plain `OK`
//! - `GET  /readyz`       readiness probe (database connectivity)
//! - `POST /upload`       multipart upload, field `file`
//! - `GET  /file/{name}`  download a stored object by name
//!
//! `{name}` is a single path segment and is used verbatim as the object key.

use crate::{
    handlers::{
        health_handlers::{readyz, up},
        upload_handlers::{get_file, upload_file},
    },
    services::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for all routes.
///
/// The router carries shared state (`AppState`) to all handlers. Uploads are
/// not size-limited, so axum's default body limit is lifted.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/up", get(up))
        .route("/readyz", get(readyz))
        .route("/upload", post(upload_file))
        .route("/file/{name}", get(get_file))
        .layer(DefaultBodyLimit::disable())
}
