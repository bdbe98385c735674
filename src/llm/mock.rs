//! Scripted provider for tests and offline demos
//!
//! Returns pre-configured responses in order and records every request.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::{EvanaError, Message, Result, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse};

/// A request observed by [`MockProvider`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub temperature: Option<f32>,
}

impl RecordedRequest {
    /// System prompt of the request, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == crate::core::Role::System)
            .map(|m| m.content.as_str())
    }
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<LLMResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    unreachable: bool,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Default::default()
        }
    }

    /// Shorthand for a sequence of plain text replies
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            replies
                .into_iter()
                .map(|r| LLMResponse::text(r, "mock"))
                .collect(),
        )
    }

    /// A provider whose every call fails as if the backend were down
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Requests observed so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn respond(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                model: model.to_string(),
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name().to_string()).collect(),
                temperature: options.and_then(|o| o.temperature),
            });
        }

        if self.unreachable {
            return Err(EvanaError::unreachable("mock", "mock://offline"));
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());

        // Return empty response if no more pre-configured responses
        Ok(next.unwrap_or_else(|| LLMResponse::text("", model)))
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.respond(model, messages, &[], options)
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.respond(model, messages, tools, options)
    }

    async fn is_model_available(&self, _model: &str) -> Result<bool> {
        if self.unreachable {
            return Err(EvanaError::unreachable("mock", "mock://offline"));
        }
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["mock".to_string()])
    }

    fn name(&self) -> &str {
        "mock"
    }
}
