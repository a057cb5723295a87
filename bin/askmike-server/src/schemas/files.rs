use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `POST /api/files/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Public path the file is served from, e.g. `/uploads/1700000000000-a.png`.
    pub url: String,
    pub pathname: String,
    pub content_type: String,
}
