//! Mock inbox loader.
//!
//! The file is a JSON array of
//! `{id, sender, subject, body, timestamp, category?, action_items?, is_read}`.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::ingest::{SyncReport, insert_new};
use crate::pipeline::types::{ActionItems, Email};
use crate::store::Database;
use crate::store::libsql_backend::parse_datetime;

#[derive(Debug, Deserialize)]
struct MockEmail {
    id: String,
    sender: String,
    subject: String,
    body: String,
    timestamp: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    action_items: Option<serde_json::Value>,
    #[serde(default)]
    is_read: bool,
}

impl MockEmail {
    fn into_email(self) -> Email {
        let action_items = self
            .action_items
            .and_then(|v| serde_json::from_value::<ActionItems>(v).ok());
        Email {
            id: self.id,
            sender: self.sender,
            subject: self.subject,
            body: self.body,
            received_at: parse_datetime(&self.timestamp),
            category: self.category,
            action_items,
            is_read: self.is_read,
        }
    }
}

/// Parse a mock inbox document.
pub fn parse_mock_inbox(json: &str) -> Result<Vec<Email>, serde_json::Error> {
    let raw: Vec<MockEmail> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(MockEmail::into_email).collect())
}

/// Load the mock inbox at `path`, inserting emails not yet stored.
pub async fn load_mock_inbox(db: &dyn Database, path: &Path) -> Result<SyncReport, IngestError> {
    let mock_err = |reason: String| IngestError::MockFile {
        path: path.display().to_string(),
        reason,
    };

    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| mock_err(e.to_string()))?;
    let emails = parse_mock_inbox(&json).map_err(|e| mock_err(e.to_string()))?;

    let report = insert_new(db, &emails).await?;
    info!(
        path = %path.display(),
        fetched = report.fetched,
        inserted = report.inserted,
        "Mock inbox loaded"
    );
    Ok(report)
}

/// Load the mock inbox only when the store holds no emails.
///
/// A missing or broken file is logged and skipped.
pub async fn seed_if_empty(db: &dyn Database, path: &Path) -> Result<usize, IngestError> {
    if db.count_emails().await? > 0 {
        return Ok(0);
    }
    match load_mock_inbox(db, path).await {
        Ok(report) => Ok(report.inserted),
        Err(IngestError::MockFile { path, reason }) => {
            warn!(path = %path, reason = %reason, "Mock inbox not loaded");
            Ok(0)
        }
        Err(e) => Err(e),
    }
}
