//! Reply-draft generation for a stored email.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::llm::ModelGateway;
use crate::pipeline::prompts::{TemplateName, compose};
use crate::pipeline::resolve_rules;
use crate::pipeline::types::{Email, GeneratedDraft};
use crate::store::Database;

/// Subject line for a reply to `subject`.
pub fn reply_subject(subject: &str) -> String {
    format!("Re: {subject}")
}

/// Generates and persists reply drafts.
pub struct DraftGenerator {
    db: Arc<dyn Database>,
    gateway: ModelGateway,
}

impl DraftGenerator {
    pub fn new(db: Arc<dyn Database>, gateway: ModelGateway) -> Self {
        Self { db, gateway }
    }

    /// Generate a reply for `email_id` and save it as a new draft.
    ///
    /// Every call inserts a new record; earlier drafts are left alone.
    pub async fn draft(&self, email_id: &str) -> Result<GeneratedDraft, PipelineError> {
        let email = self
            .db
            .get_email(email_id)
            .await?
            .ok_or_else(|| PipelineError::email_not_found(email_id))?;

        let body = self.generate_reply(&email, None).await?;
        let subject = reply_subject(&email.subject);
        let draft_id = self.db.insert_draft(&email.id, &subject, &body).await?;

        info!(email_id = %email.id, draft_id, "Draft saved");
        Ok(GeneratedDraft {
            draft_id,
            subject,
            body,
        })
    }

    /// Run the auto-reply prompt for `email`, optionally steered by a chat
    /// instruction. The response is returned verbatim and not persisted.
    pub async fn generate_reply(
        &self,
        email: &Email,
        instruction: Option<&str>,
    ) -> Result<String, PipelineError> {
        let rules = match resolve_rules(self.db.as_ref(), TemplateName::AutoReply).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "Rule lookup failed, using default");
                TemplateName::AutoReply.default_rules().to_string()
            }
        };
        let prompt = compose(
            TemplateName::AutoReply.skeleton(),
            &rules,
            &email.body,
            instruction,
        );
        Ok(self.gateway.generate(&prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::LlmError;
    use crate::pipeline::testing::{ScriptedLlm, email, gateway, memory_db};

    async fn setup(llm: ScriptedLlm) -> (Arc<ScriptedLlm>, Arc<dyn Database>, DraftGenerator) {
        let llm = Arc::new(llm);
        let db = memory_db().await;
        db.insert_email(&email("e1", "Lunch?", "Are you free for lunch Thursday?", 0))
            .await
            .unwrap();
        let generator = DraftGenerator::new(db.clone(), gateway(&llm));
        (llm, db, generator)
    }

    #[tokio::test]
    async fn draft_saves_reply_with_re_subject() {
        let (llm, db, generator) = setup(ScriptedLlm::new("Thursday works for me.")).await;

        let draft = generator.draft("e1").await.unwrap();
        assert_eq!(draft.subject, "Re: Lunch?");
        assert_eq!(draft.body, "Thursday works for me.");

        let stored = db.get_draft(draft.draft_id).await.unwrap().unwrap();
        assert_eq!(stored.email_id, "e1");
        assert_eq!(stored.subject, "Re: Lunch?");
        assert!(llm.prompt(0).contains("Are you free for lunch Thursday?"));
    }

    #[tokio::test]
    async fn drafting_twice_creates_two_records() {
        let (_llm, db, generator) = setup(ScriptedLlm::new("Sure.")).await;

        let first = generator.draft("e1").await.unwrap();
        let second = generator.draft("e1").await.unwrap();
        assert_ne!(first.draft_id, second.draft_id);
        assert_eq!(db.list_drafts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn draft_body_is_not_post_processed() {
        let raw = "```\nHi Bob,\n\nSee you then.\n```\n";
        let (_llm, _db, generator) = setup(ScriptedLlm::new(raw)).await;
        assert_eq!(generator.draft("e1").await.unwrap().body, raw);
    }

    #[tokio::test]
    async fn missing_email_is_not_found() {
        let (llm, db, generator) = setup(ScriptedLlm::new("x")).await;
        let err = generator.draft("nope").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
        assert_eq!(llm.calls(), 0);
        assert!(db.list_drafts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_failure_saves_nothing() {
        let (_llm, db, generator) = setup(ScriptedLlm::new("").fail_on("", "boom")).await;
        let err = generator.draft("e1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(LlmError::CallFailed { .. })));
        assert!(db.list_drafts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn instruction_is_appended_as_user_query() {
        let (llm, _db, generator) = setup(ScriptedLlm::new("ok")).await;
        let mail = email("x", "S", "Body text", 0);
        generator
            .generate_reply(&mail, Some("decline politely"))
            .await
            .unwrap();
        assert!(llm.prompt(0).ends_with("USER_QUERY: decline politely"));
    }
}
