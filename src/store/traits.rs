//! Unified `Database` trait: single async interface for emails, prompt
//! rules, and drafts.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::pipeline::prompts::TemplateName;
use crate::pipeline::types::{ActionItems, Draft, Email};

/// Backend-agnostic persistence for the inbox agent.
///
/// Every write is a single record-level operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Emails ──────────────────────────────────────────────────────

    /// Insert an email unless one with the same id exists.
    /// Returns `true` when a row was inserted.
    async fn insert_email(&self, email: &Email) -> Result<bool, DatabaseError>;

    /// Get an email by id.
    async fn get_email(&self, id: &str) -> Result<Option<Email>, DatabaseError>;

    /// All emails, newest first.
    async fn list_emails(&self) -> Result<Vec<Email>, DatabaseError>;

    /// Up to `limit` emails, newest first.
    async fn list_recent_emails(&self, limit: usize) -> Result<Vec<Email>, DatabaseError>;

    /// Number of stored emails.
    async fn count_emails(&self) -> Result<usize, DatabaseError>;

    /// Overwrite category and action items together in one update.
    async fn update_email_triage(
        &self,
        id: &str,
        category: &str,
        action_items: &ActionItems,
    ) -> Result<(), DatabaseError>;

    // ── Prompt rules ────────────────────────────────────────────────

    /// Get the stored rule block for a template.
    async fn get_prompt_rule(&self, name: TemplateName) -> Result<Option<String>, DatabaseError>;

    /// Insert or replace the rule block for a template.
    async fn put_prompt_rule(&self, name: TemplateName, content: &str)
    -> Result<(), DatabaseError>;

    // ── Drafts ──────────────────────────────────────────────────────

    /// Insert a new draft. Returns the assigned id.
    async fn insert_draft(
        &self,
        email_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<i64, DatabaseError>;

    /// Get a draft by id.
    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, DatabaseError>;

    /// All drafts, newest first.
    async fn list_drafts(&self) -> Result<Vec<Draft>, DatabaseError>;

    /// Update a draft's subject and body. `NotFound` if absent.
    async fn update_draft(&self, id: i64, subject: &str, body: &str)
    -> Result<(), DatabaseError>;

    /// Delete a draft. `NotFound` if absent.
    async fn delete_draft(&self, id: i64) -> Result<(), DatabaseError>;
}
