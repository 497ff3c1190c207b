//! LLM Client module for LessonBuilder
//!
//! Provides the text-completion capability used by every workflow step.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod retry;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "anthropic" and "openai" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic, openai",
                other
            )))
        }
    }
}

/// Run a single-turn completion and return its trimmed text
///
/// A response without text yields an empty string; callers decide what
/// an empty answer means for their step.
pub async fn complete_text(
    llm: &Arc<dyn LlmClient>,
    system_prompt: &str,
    user: &str,
    max_tokens: u32,
) -> Result<String, LlmError> {
    debug!(user_len = user.len(), max_tokens, "complete_text: called");
    let request = CompletionRequest::single(system_prompt, user, max_tokens);
    let response = llm.complete(request).await?;

    if response.stop_reason == StopReason::MaxTokens {
        debug!("complete_text: response hit max tokens");
    }
    debug!(
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        "complete_text: usage"
    );

    Ok(response.content.map(|t| t.trim().to_string()).unwrap_or_default())
}
