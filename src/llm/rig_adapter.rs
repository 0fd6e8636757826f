//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Wraps a rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider: provider.to_string(),
        }
    }
}

/// rig does not surface a provider-neutral stop reason, so a reply that used
/// the whole token budget is treated as cut off.
fn finish_reason(output_tokens: u64, max_tokens: Option<u32>) -> FinishReason {
    match max_tokens {
        Some(limit) if output_tokens >= u64::from(limit) => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Split messages into a preamble (system) and a single prompt (everything else).
fn flatten_messages(request: &CompletionRequest) -> (Option<String>, String) {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let prompt: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let preamble = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (preamble, prompt.join("\n\n"))
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, prompt) = flatten_messages(&request);

        let mut builder = self.model.completion_request(prompt);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::CallFailed {
            provider: self.provider.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
            finish_reason: finish_reason(response.usage.output_tokens, request.max_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;

    #[test]
    fn flatten_separates_system_from_prompt() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ]);
        let (preamble, prompt) = flatten_messages(&request);
        assert_eq!(preamble.as_deref(), Some("be terse"));
        assert_eq!(prompt, "first\n\nsecond");
    }

    #[test]
    fn full_token_budget_is_reported_as_length() {
        assert_eq!(finish_reason(4096, Some(4096)), FinishReason::Length);
        assert_eq!(finish_reason(4100, Some(4096)), FinishReason::Length);
        assert_eq!(finish_reason(120, Some(4096)), FinishReason::Stop);
        assert_eq!(finish_reason(100_000, None), FinishReason::Stop);
    }

    #[test]
    fn flatten_without_system_has_no_preamble() {
        let request = CompletionRequest::new(vec![ChatMessage::user("only")]);
        let (preamble, prompt) = flatten_messages(&request);
        assert!(preamble.is_none());
        assert_eq!(prompt, "only");
    }
}
