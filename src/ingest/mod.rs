//! Email ingestion: mock inbox file and IMAP.
//!
//! Both sources only ever add emails whose id is not stored yet; existing
//! records keep their processing results.

pub mod imap;
pub mod mock;

pub use imap::{ImapConfig, sync_imap};
pub use mock::{load_mock_inbox, seed_if_empty};

use serde::Serialize;

use crate::error::DatabaseError;
use crate::pipeline::types::Email;
use crate::store::Database;

/// Outcome of one sync: how many emails the source returned and how many
/// were new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub inserted: usize,
}

/// Insert every email not already stored.
pub(crate) async fn insert_new(
    db: &dyn Database,
    emails: &[Email],
) -> Result<SyncReport, DatabaseError> {
    let mut report = SyncReport {
        fetched: emails.len(),
        inserted: 0,
    };
    for email in emails {
        if db.insert_email(email).await? {
            report.inserted += 1;
        }
    }
    Ok(report)
}
