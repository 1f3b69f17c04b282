//! Provider adapter
//!
//! A [`GenerationProvider`] makes exactly one outbound call per `invoke`,
//! bounded by the caller's timeout, and classifies failures into
//! [`ProviderError`] kinds. [`LlmAdapter`] implements it over any
//! `council_llm::LLMProvider`.

use crate::config::{ProviderKind, ProviderSettings};
use crate::error::ProviderError;
use async_trait::async_trait;
use council_llm::providers::{AnthropicProvider, OpenAIConfig, OpenAIProvider};
use council_llm::{CompletionRequest, LLMProvider, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// One analysis backend bound to a model
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Single call, no retries
    async fn invoke(
        &self,
        prompt: &str,
        role_instructions: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, ProviderError>;

    /// Short label for logs, e.g. `openrouter/mistralai/mistral-7b-instruct`
    fn describe(&self) -> String;
}

/// [`GenerationProvider`] over a council-llm provider
pub struct LlmAdapter {
    llm: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
}

impl LlmAdapter {
    pub fn new(llm: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens: 800,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationProvider for LlmAdapter {
    #[instrument(
        skip(self, prompt, role_instructions),
        fields(provider = %self.llm.name(), model = %self.model)
    )]
    async fn invoke(
        &self,
        prompt: &str,
        role_instructions: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let request = CompletionRequest::builder(self.model.as_str())
            .system(role_instructions)
            .add_message(Message::user(prompt))
            .temperature(temperature)
            .max_tokens(self.max_tokens)
            .build();

        let response = tokio::time::timeout(timeout, self.llm.complete(request))
            .await
            .map_err(|_| ProviderError::timeout(format!("no response within {timeout:?}")))??;

        let text = response.text().trim();
        if text.is_empty() {
            return Err(ProviderError::rejected("empty completion"));
        }

        debug!(
            chars = text.len(),
            output_tokens = response.usage.output_tokens,
            "Provider responded"
        );
        Ok(text.to_string())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.llm.name(), self.model)
    }
}

/// Build the council-llm client for a provider kind
///
/// Returns `Ok(None)` when the settings carry no key for `kind`.
pub fn connect(
    kind: ProviderKind,
    settings: &ProviderSettings,
    timeout: Duration,
) -> council_llm::Result<Option<Arc<dyn LLMProvider>>> {
    let Some(key) = settings.key(kind) else {
        return Ok(None);
    };
    // The HTTP client gets headroom; the adapter enforces the real budget
    let timeout_secs = timeout.as_secs().saturating_add(5);

    let provider: Arc<dyn LLMProvider> = match kind {
        ProviderKind::OpenRouter => {
            Arc::new(OpenAIProvider::with_config(OpenAIConfig::openrouter(key).with_timeout(timeout_secs))?)
        }
        ProviderKind::Groq => {
            Arc::new(OpenAIProvider::with_config(OpenAIConfig::groq(key).with_timeout(timeout_secs))?)
        }
        ProviderKind::Mistral => {
            Arc::new(OpenAIProvider::with_config(OpenAIConfig::mistral(key).with_timeout(timeout_secs))?)
        }
        ProviderKind::Gemini => {
            Arc::new(OpenAIProvider::with_config(OpenAIConfig::gemini(key).with_timeout(timeout_secs))?)
        }
        ProviderKind::OpenAI => {
            let mut config = OpenAIConfig::new(key).with_timeout(timeout_secs);
            if let Some(base) = settings.openai_api_base() {
                config = config.with_api_base(base);
            }
            Arc::new(OpenAIProvider::with_config(config)?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::with_timeout(key, timeout_secs)?),
    };

    Ok(Some(provider))
}
