//! Health & readiness handlers.
//!
//! - GET /up      -> liveness, plain "OK"
//! - GET /readyz  -> readiness that checks database connectivity

use crate::services::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// `GET /up`
///
/// Liveness probe. Always 200 with body `OK`; performs no I/O.
pub async fn up() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /readyz`
///
/// Runs the recorder's ping. HTTP 200 when it succeeds, HTTP 503 otherwise.
/// The object store is not probed: S3 has no cheap, permission-neutral check.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.recorder.ping().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "readiness check failed");
            CheckStatus {
                ok: false,
                error: Some(e.to_string()),
            }
        }
    };

    let overall_ok = database.ok;
    let mut checks = HashMap::new();
    checks.insert("database", database);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" },
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
