//! Request / response bodies of the `/api` routes.

pub mod chat;
pub mod document;
pub mod files;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// `?id=` query parameter shared by the chat and document routes.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    pub fn require(self) -> Result<String, crate::error::ServerError> {
        self.id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| crate::error::ServerError::BadRequest("missing id".into()))
    }
}

/// Number of rows removed by a delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: u64,
}
