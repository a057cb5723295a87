//! Persistence layer.
//!
//! Each entity has its own store trait ([`UserStore`], [`ChatStore`],
//! [`MessageStore`], [`DocumentStore`]) implemented for [`SqliteStore`].
//! Handlers only see the traits, so another backend can be slotted in by
//! implementing them and changing the concrete type in
//! [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures, so no
//! `async-trait` is needed here.

pub mod chat;
pub mod dao;
pub mod document;
pub mod message;
pub mod user;

pub use chat::ChatStore;
pub use dao::{Chat, Document, DocumentKind, Message, NewChat, Suggestion};
pub use document::DocumentStore;
pub use message::MessageStore;
pub use user::UserStore;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// SQLite-backed store for every entity.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL such as `"sqlite://askmike.db"`, or
    /// `"sqlite::memory:"` for tests. An in-memory database lives in a
    /// single pooled connection that is never recycled.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

// ── Timestamp helpers ─────────────────────────────────────────────────────────

/// Current time at the precision stored in the database.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339, so string comparison in SQL is chronological.
pub(crate) fn to_db_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. A corrupt value is a decode error for `column`.
pub(crate) fn from_db_time(raw: &str, column: &'static str) -> Result<DateTime<Utc>, sqlx::Error> {
    raw.parse().map_err(|e: chrono::ParseError| sqlx::Error::ColumnDecode {
        index: column.to_owned(),
        source: Box::new(e),
    })
}
