//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Issuers accepted on provider-signed access tokens.
pub const ACCEPTED_ISSUERS: [&str; 2] = ["privy.io", "auth.privy.io"];

/// Runtime configuration for askmike-server.
///
/// Every field except the two credentials has a default so a local
/// development server only needs `PRIVY_APP_ID` and `OPENAI_API_KEY`.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite connection string (default: `"sqlite://askmike.db"`).
    pub database_url: String,

    /// Public application id issued by the wallet auth provider. Used as the
    /// expected token audience and to locate the provider's key set.
    pub privy_app_id: String,

    /// Key-set location; defaults to the provider URL derived from the app id.
    pub jwks_url: String,

    /// How long a fetched key set is trusted before it is fetched again.
    pub jwks_cache_ttl: Duration,

    /// API key for the hosted completion service.
    pub openai_api_key: String,

    /// Base URL of the OpenAI-compatible completion API.
    pub openai_base_url: String,

    /// Directory uploaded files are written to and served from.
    pub upload_dir: PathBuf,

    /// Largest accepted upload body in bytes.
    pub max_upload_bytes: usize,

    /// Comma-separated allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, log records are also written to daily-rolling files here.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let privy_app_id = std::env::var("PRIVY_APP_ID")
            .or_else(|_| std::env::var("NEXT_PUBLIC_PRIVY_APP_ID"))
            .unwrap_or_default();
        let jwks_url = std::env::var("ASKMIKE_JWKS_URL")
            .unwrap_or_else(|_| default_jwks_url(&privy_app_id));

        Self {
            bind_address: env_or("ASKMIKE_BIND", "0.0.0.0:3000"),
            database_url: env_or("ASKMIKE_DATABASE_URL", "sqlite://askmike.db"),
            privy_app_id,
            jwks_url,
            jwks_cache_ttl: Duration::from_secs(parse_env("ASKMIKE_JWKS_CACHE_SECS", 300)),
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            upload_dir: PathBuf::from(env_or("ASKMIKE_UPLOAD_DIR", "./public/uploads")),
            max_upload_bytes: parse_env("ASKMIKE_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            cors_allowed_origins: std::env::var("ASKMIKE_CORS_ORIGINS").ok(),
            enable_docs: parse_bool("ASKMIKE_ENABLE_DOCS", true),
            log_level: std::env::var("ASKMIKE_LOG").unwrap_or_else(|_| "info".to_owned()),
            log_json: parse_bool("ASKMIKE_LOG_JSON", false),
            log_dir: std::env::var("ASKMIKE_LOG_DIR").ok().map(PathBuf::from),
        }
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.privy_app_id.trim().is_empty() {
            anyhow::bail!("PRIVY_APP_ID (or NEXT_PUBLIC_PRIVY_APP_ID) is not set");
        }
        if self.openai_api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is not set");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("ASKMIKE_MAX_UPLOAD_BYTES must be greater than zero");
        }
        Ok(())
    }
}

/// Provider-hosted key-set URL for `app_id`.
pub fn default_jwks_url(app_id: &str) -> String {
    format!("https://auth.privy.io/api/v1/apps/{app_id}/jwks.json")
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
impl Config {
    /// Configuration for router tests: in-memory store, fixed app id.
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            database_url: "sqlite::memory:".into(),
            privy_app_id: crate::test_support::APP_ID.into(),
            jwks_url: default_jwks_url(crate::test_support::APP_ID),
            jwks_cache_ttl: Duration::from_secs(300),
            openai_api_key: "sk-test".into(),
            openai_base_url: "http://127.0.0.1:9/v1".into(),
            upload_dir,
            max_upload_bytes: 1024,
            cors_allowed_origins: None,
            enable_docs: true,
            log_level: "debug".into(),
            log_json: false,
            log_dir: None,
        }
    }
}
