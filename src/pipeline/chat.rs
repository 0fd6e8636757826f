//! Chat routing.
//!
//! Each message is routed on its own text by a keyword heuristic:
//! - mentions both "draft" and "reply" → reply draft for the selected email
//!   (clarification text when nothing is selected, no model call)
//! - anything else → general query answered against a summary of the
//!   most recent emails
//!
//! General replies are opportunistically split into a narrative part and a
//! trailing follow-up JSON block.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DatabaseError, PipelineError};
use crate::llm::ModelGateway;
use crate::pipeline::drafts::DraftGenerator;
use crate::pipeline::extract::parse_structured;
use crate::pipeline::prompts::{FOLLOW_UP_MARKER, general_chat_prompt};
use crate::pipeline::types::{ChatResult, Email, FollowUp};
use crate::store::Database;

/// Reply to a draft request made without a selected email.
pub const CLARIFICATION_MESSAGE: &str =
    "⚠️ PLEASE SELECT AN EMAIL FIRST: I need to know which email to reply to.";

/// Number of recent emails summarized for a general query.
pub const INBOX_CONTEXT_LIMIT: usize = 20;

/// Category shown for emails that have not been processed.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Source email id recorded on drafts saved from chat.
pub const CHAT_DRAFT_EMAIL_ID: &str = "chat_gen";

/// True when the message asks for a reply draft.
pub fn is_draft_request(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("draft") && lower.contains("reply")
}

/// One line per email: `- [category] From: sender, Subject: subject`.
pub fn build_inbox_context(emails: &[Email]) -> String {
    emails
        .iter()
        .take(INBOX_CONTEXT_LIMIT)
        .map(|e| {
            format!(
                "- [{}] From: {}, Subject: {}",
                e.category.as_deref().unwrap_or(UNCATEGORIZED),
                e.sender,
                e.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a general reply on the follow-up marker.
///
/// Falls back to the whole text when the marker is missing or the trailing
/// block does not decode.
pub fn split_structured_reply(text: &str) -> ChatResult {
    let Some((narrative, trailing)) = text.split_once(FOLLOW_UP_MARKER) else {
        return ChatResult::text(text);
    };

    match parse_structured::<FollowUp>(trailing) {
        Ok(follow_up) => ChatResult::Text {
            content: narrative.trim_end().to_string(),
            follow_up: Some(follow_up),
        },
        Err(e) => {
            debug!(error = %e, "Follow-up block unparseable, returning whole reply");
            ChatResult::text(text)
        }
    }
}

/// Routes chat messages to a draft or a general answer.
pub struct ChatRouter {
    db: Arc<dyn Database>,
    gateway: ModelGateway,
    drafts: DraftGenerator,
}

impl ChatRouter {
    pub fn new(db: Arc<dyn Database>, gateway: ModelGateway) -> Self {
        let drafts = DraftGenerator::new(db.clone(), gateway.clone());
        Self {
            db,
            gateway,
            drafts,
        }
    }

    /// Route one message. Draft results are not persisted.
    ///
    /// A blank selected id counts as no selection.
    pub async fn handle(
        &self,
        message: &str,
        selected_email_id: Option<&str>,
    ) -> Result<ChatResult, PipelineError> {
        if is_draft_request(message) {
            let selected = selected_email_id.filter(|id| !id.trim().is_empty());
            let Some(email_id) = selected else {
                info!("Draft requested without a selected email");
                return Ok(ChatResult::text(CLARIFICATION_MESSAGE));
            };
            return self.draft_for(email_id, message).await;
        }
        self.answer(message).await
    }

    async fn draft_for(&self, email_id: &str, message: &str) -> Result<ChatResult, PipelineError> {
        let email = self
            .db
            .get_email(email_id)
            .await?
            .ok_or_else(|| PipelineError::email_not_found(email_id))?;

        let content = self.drafts.generate_reply(&email, Some(message)).await?;
        info!(email_id = %email.id, "Chat draft generated");
        Ok(ChatResult::Draft { content })
    }

    async fn answer(&self, message: &str) -> Result<ChatResult, PipelineError> {
        let recent = self.db.list_recent_emails(INBOX_CONTEXT_LIMIT).await?;
        let prompt = general_chat_prompt(&build_inbox_context(&recent), message);

        let reply = self.gateway.generate(&prompt).await?;
        let result = split_structured_reply(&reply);
        debug!(context_emails = recent.len(), kind = result.label(), "Chat answered");
        Ok(result)
    }
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the in-memory exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// Set when the turn carried a draft or a parsed follow-up.
    pub structured: bool,
}

/// Transient conversation state for one interactive session. Never persisted.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<ChatTurn>,
    selected_email_id: Option<String>,
    /// Last chat draft and the message that asked for it.
    pending_draft: Option<(String, String)>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn selected_email_id(&self) -> Option<&str> {
        self.selected_email_id.as_deref()
    }

    pub fn select(&mut self, email_id: Option<String>) {
        self.selected_email_id = email_id;
    }

    /// Forget the exchange and any unsaved draft. The selection is kept.
    pub fn clear(&mut self) {
        self.history.clear();
        self.pending_draft = None;
    }

    pub fn has_pending_draft(&self) -> bool {
        self.pending_draft.is_some()
    }

    /// Route `message` and record both sides of the turn.
    ///
    /// Nothing is recorded when routing fails.
    pub async fn send(
        &mut self,
        router: &ChatRouter,
        message: &str,
    ) -> Result<ChatResult, PipelineError> {
        let result = router
            .handle(message, self.selected_email_id.as_deref())
            .await?;

        self.history.push(ChatTurn {
            role: ChatRole::User,
            content: message.to_string(),
            structured: false,
        });

        let structured = match &result {
            ChatResult::Draft { content } => {
                self.pending_draft = Some((message.to_string(), content.clone()));
                true
            }
            ChatResult::Text { follow_up, .. } => follow_up.is_some(),
        };
        self.history.push(ChatTurn {
            role: ChatRole::Assistant,
            content: result.content().to_string(),
            structured,
        });
        Ok(result)
    }

    /// Persist the last chat draft. Returns `None` when there is nothing to save.
    pub async fn save_draft(&mut self, db: &dyn Database) -> Result<Option<i64>, DatabaseError> {
        let Some((message, body)) = self.pending_draft.take() else {
            return Ok(None);
        };
        let subject = chat_draft_subject(&message);
        let id = db.insert_draft(CHAT_DRAFT_EMAIL_ID, &subject, &body).await?;
        info!(draft_id = id, "Chat draft saved");
        Ok(Some(id))
    }
}

/// `Draft from Chat: <first 20 chars>...`
pub fn chat_draft_subject(message: &str) -> String {
    let head: String = message.chars().take(20).collect();
    format!("Draft from Chat: {head}...")
}
