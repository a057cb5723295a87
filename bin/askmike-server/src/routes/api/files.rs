use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::{error, info};
use utoipa::OpenApi;

use crate::auth::Identity;
use crate::error::ServerError;
use crate::schemas::files::UploadResponse;
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 16 * 1024;

const MAX_FILE_NAME_CHARS: usize = 100;

#[derive(OpenApi)]
#[openapi(paths(upload_file), components(schemas(UploadResponse)))]
pub struct FilesApi;

pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/files/upload",
        post(upload_file).layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        )),
    )
}

/// Reduce a client-supplied file name to a safe single path component.
fn sanitize_file_name(raw: &str) -> String {
    let base = Path::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned.to_owned()
    }
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge("upload exceeds the size limit".into())
    } else {
        ServerError::BadRequest(e.body_text())
    }
}

/// Store the multipart field `file` in the public upload directory.
#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "files",
    request_body(content_type = "multipart/form-data", description = "Form with a `file` field"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file uploaded"),
        (status = 413, description = "File too large"),
    ),
    security(("bearer" = []))
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let max = state.config.max_upload_bytes;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_owned();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > max {
            return Err(ServerError::PayloadTooLarge(format!(
                "file is {} bytes; the limit is {max}",
                data.len()
            )));
        }

        let name = format!("{}-{}", Utc::now().timestamp_millis(), sanitize_file_name(&original));
        let dir = &state.config.upload_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            error!(dir = %dir.display(), error = %e, "cannot create upload directory");
            ServerError::Internal(format!("create upload dir: {e}"))
        })?;
        tokio::fs::write(dir.join(&name), &data).await.map_err(|e| {
            error!(file = %name, error = %e, "cannot write upload");
            ServerError::Internal(format!("write upload: {e}"))
        })?;

        info!(user_id = %identity.id, file = %name, bytes = data.len(), "file uploaded");
        return Ok(Json(UploadResponse {
            url: format!("/uploads/{name}"),
            pathname: name,
            content_type,
        }));
    }

    Err(ServerError::BadRequest("No file uploaded".into()))
}
