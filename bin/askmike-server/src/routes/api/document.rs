//! Versioned documents. Every version shares the document id; identity of a
//! version is `(id, createdAt)`. The owner is the author of the first version.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::auth::Identity;
use crate::entities::{Document, DocumentKind, DocumentStore, now};
use crate::error::ServerError;
use crate::routes::extract::ApiJson;
use crate::schemas::document::{DeleteVersionsRequest, SaveDocumentRequest};
use crate::schemas::{DeleteResponse, IdQuery};
use crate::services::users::ensure_user;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_document, post_document, patch_document),
    components(schemas(Document, DocumentKind, SaveDocumentRequest, DeleteVersionsRequest))
)]
pub struct DocumentApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/document",
        get(get_document).post(post_document).patch(patch_document),
    )
}

/// All versions of a document the caller owns, oldest first.
pub(crate) async fn owned_versions(
    store: &impl DocumentStore,
    id: &str,
    identity: &Identity,
) -> Result<Vec<Document>, ServerError> {
    let versions = store.list_document_versions(id).await?;
    let owner = versions
        .first()
        .map(|d| d.user_id.as_str())
        .ok_or_else(|| ServerError::NotFound("document not found".into()))?;
    if owner != identity.id {
        return Err(ServerError::Unauthorized("not the owner of this document".into()));
    }
    Ok(versions)
}

#[utoipa::path(
    get,
    path = "/api/document",
    tag = "document",
    params(IdQuery),
    responses(
        (status = 200, description = "All versions, oldest first", body = Vec<Document>),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Unknown document"),
    ),
    security(("bearer" = []))
)]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<Document>>, ServerError> {
    let id = query.require()?;
    Ok(Json(owned_versions(state.store.as_ref(), &id, &identity).await?))
}

/// Save a new version of a document.
#[utoipa::path(
    post,
    path = "/api/document",
    tag = "document",
    params(IdQuery),
    request_body = SaveDocumentRequest,
    responses(
        (status = 200, description = "Saved version", body = Document),
        (status = 401, description = "Document owned by another user"),
    ),
    security(("bearer" = []))
)]
pub async fn post_document(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
    ApiJson(req): ApiJson<SaveDocumentRequest>,
) -> Result<Json<Document>, ServerError> {
    let id = query.require()?;
    req.validate()?;

    match owned_versions(state.store.as_ref(), &id, &identity).await {
        Ok(_) | Err(ServerError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }
    ensure_user(state.store.as_ref(), &identity).await?;

    let doc = Document {
        id,
        created_at: now(),
        title: req.title,
        content: req.content,
        kind: req.kind,
        user_id: identity.id,
    };
    state.store.save_document(doc.clone()).await?;
    info!(document_id = %doc.id, kind = %doc.kind, "document version saved");
    Ok(Json(doc))
}

/// Drop every version created after `timestamp`, with its suggestions.
#[utoipa::path(
    patch,
    path = "/api/document",
    tag = "document",
    params(IdQuery),
    request_body = DeleteVersionsRequest,
    responses(
        (status = 200, description = "Versions deleted", body = DeleteResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Unknown document"),
    ),
    security(("bearer" = []))
)]
pub async fn patch_document(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<IdQuery>,
    ApiJson(req): ApiJson<DeleteVersionsRequest>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let id = query.require()?;
    owned_versions(state.store.as_ref(), &id, &identity).await?;
    let deleted = state.store.delete_documents_after(&id, req.timestamp).await?;
    info!(document_id = %id, deleted, "document versions deleted");
    Ok(Json(DeleteResponse { deleted }))
}
