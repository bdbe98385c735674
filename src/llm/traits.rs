//! The chat-backend seam
//!
//! Agents only talk to an [`LLMProvider`]; whether that is the local Ollama
//! server, a hosted OpenAI-compatible endpoint or a scripted mock is decided
//! once, at selection time.

use async_trait::async_trait;

use crate::core::{Message, Result, ToolCall, ToolDefinition};

/// One completed model turn
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    /// Empty unless the model asked for tools
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    /// Model name as reported by the backend
    pub model: String,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
            model: model.into(),
        }
    }

    /// Debug-log the token counts of this call, when the backend reported them
    pub fn log_usage(&self, agent: &str) {
        if let Some(ref usage) = self.usage {
            tracing::debug!(
                agent,
                model = %self.model,
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                total = usage.total_tokens,
                "token usage"
            );
        }
    }

    /// Assistant message attributed to `agent`, keeping any tool calls
    pub fn into_message(self, agent: &str) -> Message {
        let LLMResponse {
            content,
            tool_calls,
            ..
        } = self;
        let mut message = Message::assistant(content).with_name(agent);
        message.tool_calls = (!tool_calls.is_empty()).then_some(tool_calls);
        message
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Usage is only reported when the backend gave both counts
    pub fn from_counts(prompt: Option<u32>, completion: Option<u32>) -> Option<Self> {
        let (prompt_tokens, completion_tokens) = (prompt?, completion?);
        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        })
    }
}

/// Sampling knobs passed through to the backend
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Plain completion over `messages`
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// Completion that may answer with calls to `tools`
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    async fn is_model_available(&self, model: &str) -> Result<bool>;

    /// Models the backend can serve right now
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Short backend label for logs and `/status`
    fn name(&self) -> &str;
}
