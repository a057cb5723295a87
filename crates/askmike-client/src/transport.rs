use askmike_types::{User, UserAttributes};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ClientError;
use crate::session::SyncTransport;

#[derive(Deserialize)]
struct SyncResponse {
    user: User,
}

/// [`SyncTransport`] over `POST {base_url}/api/user/sync`.
#[derive(Debug, Clone)]
pub struct HttpSyncTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSyncTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn sync(&self, token: &str, attrs: &UserAttributes) -> Result<User, ClientError> {
        let url = format!("{}/api/user/sync", self.base_url);
        debug!(%url, user_id = %attrs.id, "syncing user");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(attrs)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<SyncResponse>().await?.user)
    }
}
