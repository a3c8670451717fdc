use crate::services::{metadata_recorder::PersistenceError, object_store::StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request, used for missing request input.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::not_found(err.to_string()),
            StoreError::Backend(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_object_maps_to_404() {
        let err: AppError = StoreError::NotFound("a.txt".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(err.message.contains("a.txt"));
    }

    #[test]
    fn backend_failures_map_to_500() {
        let store: AppError = StoreError::Backend("access denied".into()).into();
        assert_eq!(store.status, StatusCode::INTERNAL_SERVER_ERROR);

        let db: AppError = PersistenceError::Sqlx(sqlx::Error::PoolClosed).into();
        assert_eq!(db.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_error_is_a_client_error() {
        let resp = AppError::validation("no file").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
