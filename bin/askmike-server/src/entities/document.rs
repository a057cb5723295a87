use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::dao::{Document, DocumentKind, Suggestion};
use super::{SqliteStore, from_db_time, to_db_time};

pub trait DocumentStore: Send + Sync + 'static {
    /// Store a new version of a document.
    fn save_document(&self, doc: Document) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Every version of document `id`, oldest first.
    fn list_document_versions(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<Document>, sqlx::Error>> + Send;

    /// Delete versions created strictly after `after`, and their suggestions.
    fn delete_documents_after(
        &self,
        id: &str,
        after: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    fn list_suggestions(
        &self,
        document_id: &str,
    ) -> impl Future<Output = Result<Vec<Suggestion>, sqlx::Error>> + Send;
}

type DocumentRow = (String, String, String, Option<String>, String, String);

fn document_from_row((id, created_at, title, content, kind, user_id): DocumentRow) -> Result<Document, sqlx::Error> {
    let kind = DocumentKind::from_str(&kind).unwrap_or_else(|_| {
        tracing::warn!(document_id = %id, raw = %kind, "unknown document kind; treating as text");
        DocumentKind::Text
    });
    Ok(Document {
        id,
        created_at: from_db_time(&created_at, "created_at")?,
        title,
        content,
        kind,
        user_id,
    })
}

type SuggestionRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    bool,
    String,
    String,
);

impl DocumentStore for SqliteStore {
    async fn save_document(&self, doc: Document) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO documents (id, created_at, title, content, kind, user_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&doc.id)
        .bind(to_db_time(doc.created_at))
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(doc.kind.as_ref())
        .bind(&doc.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_document_versions(&self, id: &str) -> Result<Vec<Document>, sqlx::Error> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, created_at, title, content, kind, user_id \
             FROM documents WHERE id = ?1 ORDER BY created_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(document_from_row).collect()
    }

    async fn delete_documents_after(
        &self,
        id: &str,
        after: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let after = to_db_time(after);
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM suggestions WHERE document_id = ?1 AND document_created_at > ?2")
            .bind(id)
            .bind(&after)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?1 AND created_at > ?2")
            .bind(id)
            .bind(&after)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted)
    }

    async fn list_suggestions(&self, document_id: &str) -> Result<Vec<Suggestion>, sqlx::Error> {
        let rows: Vec<SuggestionRow> = sqlx::query_as(
            "SELECT id, document_id, document_created_at, original_text, suggested_text, \
                    description, is_resolved, user_id, created_at \
             FROM suggestions WHERE document_id = ?1 ORDER BY created_at ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(
                |(id, document_id, document_created_at, original_text, suggested_text, description, is_resolved, user_id, created_at)| {
                    Ok(Suggestion {
                        id,
                        document_id,
                        document_created_at: from_db_time(&document_created_at, "document_created_at")?,
                        original_text,
                        suggested_text,
                        description,
                        is_resolved,
                        user_id,
                        created_at: from_db_time(&created_at, "created_at")?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
impl SqliteStore {
    /// Suggestions are produced by the editor tooling; tests seed them directly.
    pub async fn insert_suggestion(&self, s: &Suggestion) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO suggestions (id, document_id, document_created_at, original_text, \
             suggested_text, description, is_resolved, user_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&s.id)
        .bind(&s.document_id)
        .bind(to_db_time(s.document_created_at))
        .bind(&s.original_text)
        .bind(&s.suggested_text)
        .bind(&s.description)
        .bind(s.is_resolved)
        .bind(&s.user_id)
        .bind(to_db_time(s.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
