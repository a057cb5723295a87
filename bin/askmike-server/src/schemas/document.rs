use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::DocumentKind;

/// Request body for `POST /api/document`: a new version of the document.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct SaveDocumentRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[serde(default)]
    pub kind: DocumentKind,
}

/// Request body for `PATCH /api/document`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeleteVersionsRequest {
    /// Versions created strictly after this instant are removed.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SuggestionsQuery {
    pub document_id: Option<String>,
}
