//! Model gateway: the only component that talks to the external model.
//!
//! One outbound call per `generate`. No retry: a failed call is reported to
//! the caller, which owns any retry policy.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

/// Default output cap. Large enough for a full action-item list or reply draft.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Request options applied to every gateway call.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Caller-imposed ceiling on a single call.
    pub timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        }
    }
}

/// Sends composed prompts to the model and returns raw text.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Option<Arc<dyn LlmProvider>>,
    config: GatewayConfig,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, config: GatewayConfig) -> Self {
        Self {
            provider: Some(provider),
            config,
        }
    }

    /// A gateway with no credential configured. Every call fails with `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            provider: None,
            config: GatewayConfig::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Send `prompt` as a single user message and return the response text as-is.
    ///
    /// An empty response is returned unchanged.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let provider = self.provider.as_ref().ok_or_else(|| LlmError::Unavailable {
            reason: "no model credential configured".to_string(),
        })?;

        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        debug!(
            model = provider.model_name(),
            prompt_chars = prompt.len(),
            "Sending prompt to model"
        );

        let call = provider.complete(request);
        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::CallFailed {
                    provider: provider.provider_name().to_string(),
                    reason: format!("timed out after {}s", limit.as_secs_f32()),
                }),
            },
            None => call.await,
        };

        match result {
            Ok(response) => {
                debug!(
                    model = provider.model_name(),
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Model responded"
                );
                if response.finish_reason == FinishReason::Length {
                    warn!(
                        model = provider.model_name(),
                        max_tokens = self.config.max_tokens,
                        output_tokens = response.output_tokens,
                        "Model output hit the token cap and may be truncated"
                    );
                }
                Ok(response.content)
            }
            Err(e) => {
                error!(model = provider.model_name(), error = %e, "Model call failed");
                Err(e)
            }
        }
    }
}
