//! Local backend: the Ollama chat API
//!
//! Non-streaming `/api/chat` calls with optional tool definitions, plus
//! `/api/tags` for model discovery during preflight.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::core::{Config, EvanaError, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client for a local Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

/// Request and response bodies of `/api/chat` and `/api/tags`
mod wire {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::core::ToolDefinition;

    #[derive(Debug, Serialize)]
    pub(super) struct ChatBody<'a> {
        pub model: &'a str,
        pub messages: Vec<Turn<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub tools: Option<&'a [ToolDefinition]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub options: Option<Sampling>,
        pub stream: bool,
    }

    /// Outgoing message; borrows from the caller's history
    #[derive(Debug, Serialize)]
    pub(super) struct Turn<'a> {
        pub role: &'a str,
        pub content: &'a str,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tool_calls: Vec<CallOut<'a>>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct CallOut<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub id: Option<&'a str>,
        pub function: FunctionOut<'a>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct FunctionOut<'a> {
        pub name: &'a str,
        pub arguments: &'a Value,
    }

    #[derive(Debug, Default, Serialize)]
    pub(super) struct Sampling {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f32>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ChatReply {
        pub model: String,
        pub message: Reply,
        #[serde(default, rename = "prompt_eval_count")]
        pub prompt_tokens: Option<u32>,
        #[serde(default, rename = "eval_count")]
        pub completion_tokens: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Reply {
        #[serde(default)]
        pub content: String,
        #[serde(default)]
        pub tool_calls: Option<Vec<CallIn>>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct CallIn {
        #[serde(default)]
        pub id: Option<String>,
        pub function: FunctionIn,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct FunctionIn {
        pub name: String,
        #[serde(default)]
        pub arguments: Value,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Tags {
        #[serde(default)]
        pub models: Vec<Tag>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Tag {
        pub name: String,
    }
}

impl<'a> From<&'a Message> for wire::Turn<'a> {
    fn from(message: &'a Message) -> Self {
        let tool_calls = message
            .tool_calls
            .iter()
            .flatten()
            .map(|call| wire::CallOut {
                id: call.id.as_deref(),
                function: wire::FunctionOut {
                    name: &call.name,
                    arguments: &call.arguments,
                },
            })
            .collect();
        wire::Turn {
            role: message.role.as_str(),
            content: &message.content,
            tool_calls,
        }
    }
}

impl wire::ChatReply {
    fn into_response(self) -> LLMResponse {
        let wire::ChatReply {
            model,
            message,
            prompt_tokens,
            completion_tokens,
        } = self;
        LLMResponse {
            content: message.content,
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
            usage: TokenUsage::from_counts(prompt_tokens, completion_tokens),
            model,
        }
    }
}

/// Tags are `name:variant`; an untagged name means `name:latest`
fn same_tag(installed: &str, wanted: &str) -> bool {
    let full = |tag: &str| match tag.contains(':') {
        true => tag.to_string(),
        false => format!("{}:latest", tag),
    };
    full(installed) == full(wanted)
}

impl OllamaClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(config.ollama_url(), config.local.timeout_secs)
    }

    /// Client for an explicit server URL, e.g. a test double
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::build(base_url.into(), DEFAULT_TIMEOUT_SECS)
    }

    fn build(base_url: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/api/{}", self.base_url, route)
    }

    /// Connection refusals mean the server is not running
    fn transport_error(&self, e: reqwest::Error) -> EvanaError {
        match e.is_connect() {
            true => EvanaError::unreachable("Ollama", &self.base_url),
            false => e.into(),
        }
    }

    async fn post_chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let body = wire::ChatBody {
            model,
            messages: messages.iter().map(wire::Turn::from).collect(),
            tools,
            options: options.map(|o| wire::Sampling {
                temperature: o.temperature,
            }),
            stream: false,
        };
        tracing::debug!(
            model,
            messages = messages.len(),
            tools = tools.map_or(0, <[_]>::len),
            "ollama chat request"
        );

        let response = self
            .client
            .post(self.endpoint("chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::NOT_FOUND && text.contains("not found") {
            return Err(EvanaError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            return Err(EvanaError::ollama(format!("chat failed with {}: {}", status, text)));
        }
        tracing::trace!(body = %text, "ollama chat response");

        serde_json::from_str::<wire::ChatReply>(&text)
            .map(wire::ChatReply::into_response)
            .map_err(|e| EvanaError::ollama(format!("unexpected chat body: {}", e)))
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.post_chat(model, messages, None, options).await
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.post_chat(model, messages, Some(tools), options).await
    }

    async fn is_model_available(&self, model: &str) -> Result<bool> {
        let installed = self.list_models().await?;
        Ok(installed.iter().any(|tag| same_tag(tag, model)))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint("tags"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvanaError::ollama(format!("listing models failed with {}", status)));
        }
        let tags: wire::Tags = response.json().await?;
        Ok(tags.models.into_iter().map(|tag| tag.name).collect())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_message_conversion() {
        let call = ToolCall::new("get_vehicle_state", json!({}));
        let msg = Message::tool(&call, "{\"airbags_activated\":true}");
        let turn = wire::Turn::from(&msg);
        assert_eq!(turn.role, "tool");
        assert!(turn.content.contains("airbags"));
        assert!(turn.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_chat_sends_temperature_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "mistral:7b",
                "stream": false,
                "options": { "temperature": 0.0 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mistral:7b",
                "message": { "role": "assistant", "content": "I am here with you." },
                "prompt_eval_count": 12,
                "eval_count": 6
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri()).unwrap();
        let response = client
            .chat(
                "mistral:7b",
                &[Message::user("help")],
                Some(GenerateOptions {
                    temperature: Some(0.0),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        assert_eq!(response.content, "I am here with you.");
        assert_eq!(response.usage.unwrap().total_tokens, 18);
    }

    #[tokio::test]
    async fn test_chat_with_tools_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mistral:7b",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        { "function": { "name": "get_vehicle_state", "arguments": {} } }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri()).unwrap();
        let tools = [ToolDefinition::function(
            "get_vehicle_state",
            "state",
            json!({"type": "object", "properties": {}}),
        )];
        let response = client
            .chat_with_tools("mistral:7b", &[Message::user("status")], &tools, None)
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "get_vehicle_state");
        assert_eq!(response.into_message("agent").role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_missing_model_maps_to_model_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("{\"error\":\"model 'x' not found\"}"),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri()).unwrap();
        let err = client.chat("x", &[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, EvanaError::ModelNotFound(ref m) if m == "x"));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_at_call_time() {
        let client = OllamaClient::with_base_url("http://127.0.0.1:9").unwrap();
        let err = client.chat("mistral:7b", &[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, EvanaError::BackendUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_model_availability_matches_exact_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{ "name": "mistral:latest" }, { "name": "llama3:70b" }]
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri()).unwrap();
        assert!(client.is_model_available("mistral").await.unwrap());
        assert!(client.is_model_available("mistral:latest").await.unwrap());
        assert!(client.is_model_available("llama3:70b").await.unwrap());
        assert!(!client.is_model_available("mistral:7b").await.unwrap());
        assert!(!client.is_model_available("llama3:8b").await.unwrap());
        assert!(!client.is_model_available("llama3").await.unwrap());
    }
}
