use std::future::Future;

use askmike_types::{User, UserAttributes};

use super::{SqliteStore, from_db_time, now, to_db_time};

pub trait UserStore: Send + Sync + 'static {
    /// Create the user or update the fields supplied in `attrs`.
    ///
    /// One atomic statement keyed on `id`. Fields left as `None` keep their
    /// stored value; `updated_at` always advances; `created_at` and `id` are
    /// written only on insert.
    fn upsert_user(
        &self,
        attrs: UserAttributes,
    ) -> impl Future<Output = Result<User, sqlx::Error>> + Send;

    fn get_user(&self, id: &str) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;
}

type UserRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
);

const USER_COLUMNS: &str = "id, email, wallet_address, wallet_public_key, name, image, \
                            email_verified, created_at, updated_at";

fn user_from_row(row: UserRow) -> Result<User, sqlx::Error> {
    let (id, email, wallet_address, wallet_public_key, name, image, email_verified, created_at, updated_at) =
        row;
    Ok(User {
        id,
        email,
        wallet_address,
        wallet_public_key,
        name,
        image,
        email_verified: email_verified
            .map(|raw| from_db_time(&raw, "email_verified"))
            .transpose()?,
        created_at: from_db_time(&created_at, "created_at")?,
        updated_at: from_db_time(&updated_at, "updated_at")?,
    })
}

impl UserStore for SqliteStore {
    async fn upsert_user(&self, attrs: UserAttributes) -> Result<User, sqlx::Error> {
        let ts = to_db_time(now());
        let email_verified = attrs.email_verified.map(to_db_time);
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             ON CONFLICT(id) DO UPDATE SET \
               email             = COALESCE(excluded.email, users.email), \
               wallet_address    = COALESCE(excluded.wallet_address, users.wallet_address), \
               wallet_public_key = COALESCE(excluded.wallet_public_key, users.wallet_public_key), \
               name              = COALESCE(excluded.name, users.name), \
               image             = COALESCE(excluded.image, users.image), \
               email_verified    = COALESCE(excluded.email_verified, users.email_verified), \
               updated_at        = excluded.updated_at \
             RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(&attrs.id)
            .bind(&attrs.email)
            .bind(&attrs.wallet_address)
            .bind(&attrs.wallet_public_key)
            .bind(&attrs.name)
            .bind(&attrs.image)
            .bind(&email_verified)
            .bind(&ts)
            .fetch_one(&self.pool)
            .await?;
        tracing::debug!(user_id = %attrs.id, "user upserted");
        user_from_row(row)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }
}
