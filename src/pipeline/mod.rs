//! Email triage pipeline.
//!
//! Every request flows through the same chain:
//! 1. `prompts::compose()`: fixed skeleton + stored rule block + content
//! 2. `ModelGateway::generate()`: one model call, raw text back
//! 3. `extract`: fence stripping and structured decoding
//!
//! `EmailProcessor`, `DraftGenerator` and `ChatRouter` are the three entry
//! points. None of them keep state between invocations; the store is the
//! only shared resource.

pub mod chat;
pub mod drafts;
pub mod extract;
pub mod processor;
pub mod prompts;
pub mod types;

pub use chat::{ChatRouter, ChatSession};
pub use drafts::DraftGenerator;
pub use processor::EmailProcessor;

use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::pipeline::prompts::TemplateName;
use crate::store::Database;

/// Current rule block for `name`, falling back to the built-in default.
pub async fn resolve_rules(db: &dyn Database, name: TemplateName) -> Result<String, DatabaseError> {
    match db.get_prompt_rule(name).await? {
        Some(rules) => Ok(rules),
        None => {
            warn!(template = %name, "No stored rules, using default");
            Ok(name.default_rules().to_string())
        }
    }
}

/// Store the default rule block for every template that has none yet.
///
/// Returns the number of templates seeded.
pub async fn seed_default_rules(db: &dyn Database) -> Result<usize, DatabaseError> {
    let mut seeded = 0;
    for name in TemplateName::ALL {
        if db.get_prompt_rule(name).await?.is_none() {
            db.put_prompt_rule(name, name.default_rules()).await?;
            seeded += 1;
        }
    }
    if seeded > 0 {
        info!(seeded, "Seeded default prompt rules");
    }
    Ok(seeded)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model and store fixtures shared by pipeline tests.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use crate::error::LlmError;
    use crate::llm::provider::{
        CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
    };
    use crate::llm::{GatewayConfig, ModelGateway};
    use crate::pipeline::types::Email;
    use crate::store::{Database, LibSqlBackend};

    /// Answers by matching a needle in the prompt; records every prompt.
    pub struct ScriptedLlm {
        rules: Vec<(String, Result<String, String>)>,
        fallback: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new(fallback: &str) -> Self {
            Self {
                rules: Vec::new(),
                fallback: fallback.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// Reply with `reply` when the prompt contains `needle`.
        pub fn on(mut self, needle: &str, reply: &str) -> Self {
            self.rules.push((needle.to_string(), Ok(reply.to_string())));
            self
        }

        /// Fail the call when the prompt contains `needle`.
        pub fn fail_on(mut self, needle: &str, reason: &str) -> Self {
            self.rules.push((needle.to_string(), Err(reason.to_string())));
            self
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        pub fn prompt(&self, index: usize) -> String {
            self.prompts.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let prompt: String = request
                .messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            self.prompts.lock().unwrap().push(prompt.clone());

            let outcome = self
                .rules
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, outcome)| outcome.clone())
                .unwrap_or_else(|| Ok(self.fallback.clone()));

            match outcome {
                Ok(content) => Ok(CompletionResponse {
                    content,
                    input_tokens: 10,
                    output_tokens: 5,
                    finish_reason: FinishReason::Stop,
                }),
                Err(reason) => Err(LlmError::CallFailed {
                    provider: "scripted".into(),
                    reason,
                }),
            }
        }
    }

    pub fn gateway(llm: &Arc<ScriptedLlm>) -> ModelGateway {
        ModelGateway::new(llm.clone(), GatewayConfig::default())
    }

    pub async fn memory_db() -> Arc<dyn Database> {
        Arc::new(LibSqlBackend::new_memory().await.unwrap())
    }

    pub fn email(id: &str, subject: &str, body: &str, minutes_ago: i64) -> Email {
        Email::new(
            id,
            "bob@example.com",
            subject,
            body,
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    #[tokio::test]
    async fn resolve_rules_falls_back_to_default() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let rules = resolve_rules(&db, TemplateName::AutoReply).await.unwrap();
        assert_eq!(rules, TemplateName::AutoReply.default_rules());

        db.put_prompt_rule(TemplateName::AutoReply, "Sign off as Sam")
            .await
            .unwrap();
        let rules = resolve_rules(&db, TemplateName::AutoReply).await.unwrap();
        assert_eq!(rules, "Sign off as Sam");
    }

    #[tokio::test]
    async fn seeding_keeps_user_edits() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.put_prompt_rule(TemplateName::Categorization, "custom")
            .await
            .unwrap();

        assert_eq!(seed_default_rules(&db).await.unwrap(), 2);
        assert_eq!(seed_default_rules(&db).await.unwrap(), 0);

        let rule = db.get_prompt_rule(TemplateName::Categorization).await.unwrap();
        assert_eq!(rule.as_deref(), Some("custom"));
    }
}
