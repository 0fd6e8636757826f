//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::pipeline::prompts::TemplateName;
use crate::pipeline::types::{ActionItems, Draft, Email};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_emails(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        op: &str,
    ) -> Result<Vec<Email>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut emails = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_email(&row) {
                Ok(email) => emails.push(email),
                Err(e) => warn!("Skipping email row: {e}"),
            }
        }
        Ok(emails)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339, naive ISO 8601, or SQLite datetime string into DateTime<Utc>.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // ISO 8601 without offset, treated as UTC
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return ndt.and_utc();
    }
    // Try SQLite datetime() output with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Decode the stored action-items JSON, treating garbage as the empty fallback.
fn decode_action_items(raw: Option<String>) -> Option<ActionItems> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!(error = %e, "Stored action_items is not valid JSON, using empty list");
            Some(ActionItems::empty())
        }
    }
}

/// Map a libsql Row to an Email.
///
/// Column order matches EMAIL_COLUMNS.
fn row_to_email(row: &libsql::Row) -> Result<Email, libsql::Error> {
    let received_str: String = row.get(4)?;
    let is_read: i64 = row.get(7)?;

    Ok(Email {
        id: row.get(0)?,
        sender: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        received_at: parse_datetime(&received_str),
        category: row.get::<String>(5).ok(),
        action_items: decode_action_items(row.get::<String>(6).ok()),
        is_read: is_read != 0,
    })
}

/// Map a libsql Row to a Draft.
///
/// Column order matches DRAFT_COLUMNS.
fn row_to_draft(row: &libsql::Row) -> Result<Draft, libsql::Error> {
    let created_str: String = row.get(4)?;
    Ok(Draft {
        id: row.get(0)?,
        email_id: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const EMAIL_COLUMNS: &str =
    "id, sender, subject, body, received_at, category, action_items, is_read";

const DRAFT_COLUMNS: &str = "id, email_id, subject, body, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Emails ──────────────────────────────────────────────────────

    async fn insert_email(&self, email: &Email) -> Result<bool, DatabaseError> {
        let action_items = email
            .action_items
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::Serialization(format!("action_items: {e}")))?;

        let inserted = self
            .conn()
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO emails ({EMAIL_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    email.id.as_str(),
                    email.sender.as_str(),
                    email.subject.as_str(),
                    email.body.as_str(),
                    format_datetime(&email.received_at),
                    opt_text(email.category.as_deref()),
                    opt_text(action_items.as_deref()),
                    i64::from(email.is_read),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_email: {e}")))?;

        debug!(id = %email.id, inserted = inserted > 0, "Email insert");
        Ok(inserted > 0)
    }

    async fn get_email(&self, id: &str) -> Result<Option<Email>, DatabaseError> {
        let mut emails = self
            .query_emails(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
                "get_email",
            )
            .await?;
        Ok(emails.pop())
    }

    async fn list_emails(&self) -> Result<Vec<Email>, DatabaseError> {
        self.query_emails(
            &format!("SELECT {EMAIL_COLUMNS} FROM emails ORDER BY received_at DESC, id ASC"),
            (),
            "list_emails",
        )
        .await
    }

    async fn list_recent_emails(&self, limit: usize) -> Result<Vec<Email>, DatabaseError> {
        self.query_emails(
            &format!(
                "SELECT {EMAIL_COLUMNS} FROM emails ORDER BY received_at DESC, id ASC LIMIT ?1"
            ),
            params![limit as i64],
            "list_recent_emails",
        )
        .await
    }

    async fn count_emails(&self) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM emails", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_emails: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count_emails: {e}")))?;
                Ok(count.max(0) as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_emails: {e}"))),
        }
    }

    async fn update_email_triage(
        &self,
        id: &str,
        category: &str,
        action_items: &ActionItems,
    ) -> Result<(), DatabaseError> {
        let items_json = serde_json::to_string(action_items)
            .map_err(|e| DatabaseError::Serialization(format!("action_items: {e}")))?;

        let updated = self
            .conn()
            .execute(
                "UPDATE emails SET category = ?1, action_items = ?2 WHERE id = ?3",
                params![category, items_json, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_email_triage: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "email".into(),
                id: id.to_string(),
            });
        }
        debug!(id = id, category = category, "Email triage stored");
        Ok(())
    }

    // ── Prompt rules ────────────────────────────────────────────────

    async fn get_prompt_rule(&self, name: TemplateName) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT content FROM prompts WHERE name = ?1",
                params![name.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_prompt_rule: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let content: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(content))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_prompt_rule: {e}"))),
        }
    }

    async fn put_prompt_rule(
        &self,
        name: TemplateName,
        content: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO prompts (name, content, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET content = excluded.content,
                     updated_at = excluded.updated_at",
                params![name.as_str(), content, format_datetime(&Utc::now())],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("put_prompt_rule: {e}")))?;

        debug!(name = %name, "Prompt rule saved");
        Ok(())
    }

    // ── Drafts ──────────────────────────────────────────────────────

    async fn insert_draft(
        &self,
        email_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO drafts (email_id, subject, body, created_at)
                 VALUES (?1, ?2, ?3, ?4) RETURNING id",
                params![email_id, subject, body, format_datetime(&Utc::now())],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_draft: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_draft: {e}")))?
            .ok_or_else(|| DatabaseError::Query("insert_draft: no id returned".into()))?;
        let id: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("insert_draft: {e}")))?;

        debug!(id, email_id = email_id, "Draft inserted");
        Ok(id)
    }

    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_draft: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let draft = row_to_draft(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(draft))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_draft: {e}"))),
        }
    }

    async fn list_drafts(&self) -> Result<Vec<Draft>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {DRAFT_COLUMNS} FROM drafts ORDER BY created_at DESC, id DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_drafts: {e}")))?;

        let mut drafts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_draft(&row) {
                Ok(draft) => drafts.push(draft),
                Err(e) => warn!("Skipping draft row: {e}"),
            }
        }
        Ok(drafts)
    }

    async fn update_draft(&self, id: i64, subject: &str, body: &str) -> Result<(), DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE drafts SET subject = ?1, body = ?2 WHERE id = ?3",
                params![subject, body, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_draft: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "draft".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_draft(&self, id: i64) -> Result<(), DatabaseError> {
        let deleted = self
            .conn()
            .execute("DELETE FROM drafts WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_draft: {e}")))?;

        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity: "draft".into(),
                id: id.to_string(),
            });
        }
        debug!(id, "Draft deleted");
        Ok(())
    }
}
