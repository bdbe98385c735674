//! Hosted OpenAI-compatible client
//!
//! Speaks the `/v1/chat/completions` API with function tools.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::{Config, EvanaError, Message, Result, Role, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Client for a hosted chat-completions API
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChoiceToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChoiceToolCall {
    id: String,
    function: ChoiceFunction,
}

#[derive(Debug, Deserialize)]
struct ChoiceFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiClient {
    pub fn from_config(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        Self::build(
            config.hosted.base_url.clone(),
            api_key.into(),
            config.hosted.timeout_secs,
        )
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::build(base_url.into(), api_key.into(), 120)
    }

    fn build(base_url: String, api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Convert messages to the chat-completions wire format
    fn wire_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut converted = json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                });

                if let Some(ref calls) = msg.tool_calls {
                    converted["tool_calls"] = calls
                        .iter()
                        .enumerate()
                        .map(|(i, call)| {
                            json!({
                                "id": call.id.clone().unwrap_or_else(|| format!("call_{}", i)),
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                }

                if msg.role == Role::Tool {
                    converted["tool_call_id"] =
                        json!(msg.tool_call_id.as_deref().unwrap_or("call_0"));
                }

                converted
            })
            .collect()
    }

    fn connect_error(&self, e: reqwest::Error) -> EvanaError {
        if e.is_connect() {
            EvanaError::unreachable("hosted model API", &self.base_url)
        } else {
            EvanaError::from(e)
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let mut payload = json!({
            "model": model,
            "messages": Self::wire_messages(messages),
        });

        if !tools.is_empty() {
            payload["tools"] = serde_json::to_value(tools)?;
        }
        if let Some(temp) = options.and_then(|o| o.temperature) {
            payload["temperature"] = json!(temp);
        }

        tracing::debug!(model, messages = messages.len(), tools = tools.len(), "hosted chat request");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(EvanaError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EvanaError::hosted(format!(
                "Request failed ({}): {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| EvanaError::hosted(format!("Failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EvanaError::hosted("Response contained no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::String(tc.function.arguments));
                ToolCall::new(tc.function.name, arguments).with_id(tc.id)
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: completion
                .usage
                .and_then(|u| TokenUsage::from_counts(u.prompt_tokens, u.completion_tokens)),
            model: if completion.model.is_empty() {
                model.to_string()
            } else {
                completion.model
            },
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.complete(model, messages, &[], options).await
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.complete(model, messages, tools, options).await
    }

    async fn is_model_available(&self, model: &str) -> Result<bool> {
        Ok(self.list_models().await?.iter().any(|m| m == model))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            return Err(EvanaError::hosted(format!(
                "Failed to list models ({})",
                response.status()
            )));
        }

        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
