//! HTTP handlers for uploading and retrieving files.
//! Storage is delegated to the `ObjectStore`, bookkeeping to the
//! `MetadataRecorder`; both come from `AppState`.

use crate::{errors::AppError, services::AppState};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tracing::{Span, error, field, info, instrument};

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// RFC 5987 `attr-char` complement, for `filename*=`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub uploads_in_db: i64,
}

/// `POST /upload`: store the `file` part under its filename and record the name.
///
/// The object is written before the name is recorded. If recording fails the
/// object stays in the bucket without a row.
#[instrument(skip_all, fields(key = field::Empty))]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (key, data) = read_file_part(&mut multipart)
        .await?
        .ok_or_else(|| AppError::validation("no file"))?;
    Span::current().record("key", key.as_str());
    let size_bytes = data.len();

    state.store.put(&key, data).await?;

    let uploads_in_db = state.recorder.record_if_new(&key).await.map_err(|err| {
        error!(key, error = %err, "object stored but upload not recorded");
        err
    })?;

    info!(key, size_bytes, uploads_in_db, "file uploaded");
    Ok(Json(UploadResponse {
        url: state.config.public_url(&key),
        uploads_in_db,
    }))
}

/// `GET /file/{name}`: return the stored object bytes.
#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let data = state.store.get(&name).await?;
    let length = data.len();
    let content_type = mime_guess::from_path(&name).first_or_octet_stream();

    let mut response = Response::new(Body::from(data));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(&name));

    Ok(response)
}

/// Return the first `file` part that has a filename, with its bytes.
///
/// `None` when no such part exists or its filename is empty. Parts named
/// `file` without a filename are plain form fields and are skipped.
async fn read_file_part(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if filename.is_empty() {
            return Ok(None);
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::new(e.status(), e.body_text()))?;
        return Ok(Some((filename, data)));
    }
    Ok(None)
}

/// Build an `inline` disposition naming `name` as the download filename.
///
/// Names that are not plain printable ASCII also get an RFC 5987
/// `filename*` parameter; the quoted fallback keeps only safe ASCII.
fn content_disposition(name: &str) -> HeaderValue {
    let plain = name
        .chars()
        .all(|c| (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\');

    let value = if plain {
        format!("inline; filename=\"{}\"", name)
    } else {
        let fallback: String = name
            .chars()
            .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
            .collect();
        format!(
            "inline; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(name, ATTR_CHAR)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("inline"))
}
