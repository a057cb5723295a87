use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("sync rejected with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The wallet provider failed (token fetch or logout).
    #[error("wallet provider error: {0}")]
    Provider(String),
}
