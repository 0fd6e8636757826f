//! Email processor: categorization plus action-item extraction for one email.
//!
//! Both model calls run before anything is written. A model failure aborts
//! the whole operation; a parse failure on the action items degrades to an
//! empty list. The triage result is persisted in a single update.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{LlmError, PipelineError};
use crate::llm::ModelGateway;
use crate::pipeline::extract::parse_structured;
use crate::pipeline::prompts::{TemplateName, compose};
use crate::pipeline::resolve_rules;
use crate::pipeline::types::{ActionItemPayload, ActionItems, Email, ProcessedEmail};
use crate::store::Database;

/// Categorizes emails and extracts their action items.
pub struct EmailProcessor {
    db: Arc<dyn Database>,
    gateway: ModelGateway,
}

impl EmailProcessor {
    pub fn new(db: Arc<dyn Database>, gateway: ModelGateway) -> Self {
        Self { db, gateway }
    }

    /// Process one email and persist category and action items together.
    pub async fn process(&self, email_id: &str) -> Result<ProcessedEmail, PipelineError> {
        let email = self
            .db
            .get_email(email_id)
            .await?
            .ok_or_else(|| PipelineError::email_not_found(email_id))?;

        info!(email_id = %email.id, subject = %email.subject, "Processing email");

        let category = self
            .categorize(&email)
            .await
            .map_err(|e| processing_failed(email_id, e))?;
        let action_items = self
            .extract_action_items(&email)
            .await
            .map_err(|e| processing_failed(email_id, e))?;

        self.db
            .update_email_triage(&email.id, &category, &action_items)
            .await?;

        info!(
            email_id = %email.id,
            category = %category,
            tasks = action_items.tasks().len(),
            "Email processed"
        );

        Ok(ProcessedEmail {
            email_id: email.id,
            category,
            action_items,
        })
    }

    /// The trimmed model output is the category, verbatim.
    async fn categorize(&self, email: &Email) -> Result<String, LlmError> {
        let prompt = self.prompt_for(TemplateName::Categorization, email).await;
        let raw = self.gateway.generate(&prompt).await?;
        Ok(raw.trim().to_string())
    }

    async fn extract_action_items(&self, email: &Email) -> Result<ActionItems, LlmError> {
        let prompt = self.prompt_for(TemplateName::ActionItems, email).await;
        let raw = self.gateway.generate(&prompt).await?;

        match parse_structured::<ActionItemPayload>(&raw) {
            Ok(payload) => {
                debug!(email_id = %email.id, tasks = payload.tasks.len(), "Action items parsed");
                Ok(ActionItems::Extracted(payload))
            }
            Err(e) => {
                warn!(
                    email_id = %email.id,
                    error = %e,
                    raw = %e.excerpt,
                    "Action items unparseable, storing empty list"
                );
                Ok(ActionItems::empty())
            }
        }
    }

    async fn prompt_for(&self, name: TemplateName, email: &Email) -> String {
        // A rule lookup failure is not a model failure.
        let rules = match resolve_rules(self.db.as_ref(), name).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(template = %name, error = %e, "Rule lookup failed, using default");
                name.default_rules().to_string()
            }
        };
        compose(name.skeleton(), &rules, &email.body, None)
    }
}

fn processing_failed(email_id: &str, source: LlmError) -> PipelineError {
    error!(email_id = email_id, error = %source, "Email processing aborted");
    PipelineError::ProcessingFailed {
        email_id: email_id.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::pipeline::testing::{ScriptedLlm, email, gateway, memory_db};
    use crate::pipeline::types::Priority;

    const CATEGORY_NEEDLE: &str = "Email Classification Engine";
    const ACTION_NEEDLE: &str = "Task Extraction Agent";

    async fn setup(llm: ScriptedLlm) -> (Arc<ScriptedLlm>, Arc<dyn Database>, EmailProcessor) {
        let llm = Arc::new(llm);
        let db = memory_db().await;
        db.insert_email(&email("e1", "Invoice", "Please send the invoice by Friday.", 0))
            .await
            .unwrap();
        let processor = EmailProcessor::new(db.clone(), gateway(&llm));
        (llm, db, processor)
    }

    #[tokio::test]
    async fn process_persists_category_and_tasks() {
        let llm = ScriptedLlm::new("")
            .on(CATEGORY_NEEDLE, "  To-Do\n")
            .on(
                ACTION_NEEDLE,
                "```json\n{\"action_summary\": \"Send invoice\", \"tasks\": [{\"task\": \"Send invoice\", \"deadline\": \"EOD Friday\", \"priority\": \"High\"}]}\n```",
            );
        let (llm, db, processor) = setup(llm).await;

        let result = processor.process("e1").await.unwrap();
        assert_eq!(result.category, "To-Do");
        assert_eq!(result.action_items.tasks().len(), 1);
        assert_eq!(result.action_items.tasks()[0].priority, Priority::High);
        assert_eq!(llm.calls(), 2);

        let stored = db.get_email("e1").await.unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("To-Do"));
        assert_eq!(stored.action_items, Some(result.action_items));
    }

    #[tokio::test]
    async fn prompts_carry_email_body_and_rules() {
        let llm = ScriptedLlm::new("[]").on(CATEGORY_NEEDLE, "Important");
        let (llm, db, processor) = setup(llm).await;
        db.put_prompt_rule(TemplateName::Categorization, "Invoices are always Important")
            .await
            .unwrap();

        processor.process("e1").await.unwrap();

        let categorize = llm.prompt(0);
        assert!(categorize.contains("Invoices are always Important"));
        assert!(categorize.contains("Please send the invoice by Friday."));
        let extract = llm.prompt(1);
        assert!(extract.contains(ACTION_NEEDLE));
        assert!(extract.contains(TemplateName::ActionItems.default_rules()));
    }

    #[tokio::test]
    async fn unparseable_action_items_keep_category() {
        let llm = ScriptedLlm::new("")
            .on(CATEGORY_NEEDLE, "Newsletter")
            .on(ACTION_NEEDLE, "Sorry, I can't find any tasks here.");
        let (_llm, db, processor) = setup(llm).await;

        let result = processor.process("e1").await.unwrap();
        assert_eq!(result.category, "Newsletter");
        assert!(result.action_items.is_fallback());

        let stored = db.get_email("e1").await.unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("Newsletter"));
        assert_eq!(stored.action_items, Some(ActionItems::empty()));
    }

    #[tokio::test]
    async fn model_failure_persists_nothing() {
        let llm = ScriptedLlm::new("")
            .on(CATEGORY_NEEDLE, "Spam")
            .fail_on(ACTION_NEEDLE, "connection reset");
        let (_llm, db, processor) = setup(llm).await;

        let err = processor.process("e1").await.unwrap_err();
        assert!(matches!(err, PipelineError::ProcessingFailed { .. }));

        let stored = db.get_email("e1").await.unwrap().unwrap();
        assert!(stored.category.is_none());
        assert!(stored.action_items.is_none());
    }

    #[tokio::test]
    async fn missing_email_is_not_found_without_model_call() {
        let (llm, _db, processor) = setup(ScriptedLlm::new("x")).await;
        let err = processor.process("nope").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_model_fails_processing() {
        let db = memory_db().await;
        db.insert_email(&email("e1", "Hi", "Body", 0)).await.unwrap();
        let processor = EmailProcessor::new(db, ModelGateway::unavailable());

        match processor.process("e1").await.unwrap_err() {
            PipelineError::ProcessingFailed { source, .. } => {
                assert!(matches!(source, LlmError::Unavailable { .. }))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reprocessing_overwrites_previous_result() {
        let llm = ScriptedLlm::new("[]").on(CATEGORY_NEEDLE, "Meeting");
        let (_llm, db, processor) = setup(llm).await;
        db.update_email_triage("e1", "Spam", &ActionItems::empty())
            .await
            .unwrap();

        processor.process("e1").await.unwrap();
        let stored = db.get_email("e1").await.unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("Meeting"));
    }

}
