//! Worker agents
//!
//! Role-scoped agents the supervisor delegates to. Each call starts from the
//! agent's system prompt and the supervisor's instruction only; no history is
//! carried between calls.

use std::sync::Arc;
use uuid::Uuid;

use crate::agent::prompts;
use crate::agent::text::limit_sentences;
use crate::agent::update::{Update, UpdateSink};
use crate::core::{EvanaError, Message, Result, ToolDefinition, ToolResult};
use crate::llm::ModelSelection;
use crate::tools::{vehicle, ToolRegistry};

/// A role-scoped agent bound to the shared model
#[derive(Clone)]
pub struct WorkerAgent {
    name: String,
    system_prompt: String,
    /// Tool names this agent may call
    allowed_tools: Vec<String>,
    model: ModelSelection,
    tools: Arc<ToolRegistry>,
    /// Maximum model calls per run
    max_steps: usize,
    /// Sentences kept from the final reply
    max_sentences: usize,
}

/// Builder for creating WorkerAgents
pub struct WorkerAgentBuilder {
    name: String,
    system_prompt: Option<String>,
    allowed_tools: Vec<String>,
    model: Option<ModelSelection>,
    tools: Option<Arc<ToolRegistry>>,
    max_steps: usize,
    max_sentences: usize,
}

impl WorkerAgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: None,
            allowed_tools: Vec::new(),
            model: None,
            tools: None,
            max_steps: 3,
            max_sentences: 3,
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set allowed tools (empty = no tools)
    pub fn allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    pub fn model(mut self, model: ModelSelection) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    pub fn max_sentences(mut self, max: usize) -> Self {
        self.max_sentences = max.max(1);
        self
    }

    pub fn build(self) -> Result<WorkerAgent> {
        let model = self
            .model
            .ok_or_else(|| EvanaError::config(format!("agent '{}' has no model", self.name)))?;

        if let Some(ref registry) = self.tools {
            if let Some(missing) = self.allowed_tools.iter().find(|t| !registry.contains(t)) {
                return Err(EvanaError::config(format!(
                    "agent '{}' references unknown tool '{}'",
                    self.name, missing
                )));
            }
        }

        Ok(WorkerAgent {
            system_prompt: self.system_prompt.unwrap_or_else(|| {
                format!(
                    "You are a helpful agent named '{}'. Complete the task you are given.",
                    self.name
                )
            }),
            name: self.name,
            allowed_tools: self.allowed_tools,
            model,
            tools: self.tools.unwrap_or_else(|| Arc::new(ToolRegistry::new())),
            max_steps: self.max_steps,
            max_sentences: self.max_sentences,
        })
    }
}

impl WorkerAgent {
    pub fn builder(name: impl Into<String>) -> WorkerAgentBuilder {
        WorkerAgentBuilder::new(name)
    }

    /// The vehicle situation reporter: one tool, one sentence
    pub fn situation_agent(
        model: ModelSelection,
        tools: Arc<ToolRegistry>,
        max_steps: usize,
    ) -> Result<Self> {
        Self::builder(prompts::SITUATION_AGENT)
            .system_prompt(prompts::SITUATION_PROMPT)
            .allowed_tools(vec![vehicle::TOOL_NAME.to_string()])
            .model(model)
            .tools(tools)
            .max_steps(max_steps)
            .max_sentences(1)
            .build()
    }

    /// The empathetic rephraser: no tools, up to three sentences
    pub fn empathetic_agent(model: ModelSelection) -> Result<Self> {
        Self::builder(prompts::EMPATHETIC_AGENT)
            .system_prompt(prompts::EMPATHETIC_PROMPT)
            .model(model)
            .max_steps(1)
            .max_sentences(3)
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_tools(&self) -> &[String] {
        &self.allowed_tools
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run on one instruction, emitting the trace into `sink`
    ///
    /// Returns the reply trimmed to the agent's sentence limit, which may be
    /// empty when the model produced no text.
    pub async fn run(&self, instruction: &str, sink: &UpdateSink) -> Result<String> {
        let namespace = format!("{}:{}", self.name, Uuid::new_v4());
        let provider = self.model.provider();
        let model = self.model.model();

        let mut messages = vec![
            Message::system(&self.system_prompt),
            Message::user(instruction),
        ];
        let tool_defs: Vec<ToolDefinition> = self.tools.definitions_for(&self.allowed_tools);

        for step in 0..self.max_steps {
            let response = if tool_defs.is_empty() {
                provider
                    .chat(model, &messages, Some(self.model.options()))
                    .await?
            } else {
                provider
                    .chat_with_tools(model, &messages, &tool_defs, Some(self.model.options()))
                    .await?
            };
            response.log_usage(&self.name);

            if response.tool_calls.is_empty() {
                return Ok(self.finish(response.content, &namespace, sink));
            }

            let mut response = response;
            for (i, call) in response.tool_calls.iter_mut().enumerate() {
                if call.id.is_none() {
                    call.id = Some(format!("call_{}_{}", step, i));
                }
            }
            let calls = response.tool_calls.clone();
            let request = response.into_message(&self.name);
            sink.emit(Update::subgraph(&namespace, "agent", vec![request.clone()]));
            messages.push(request);

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = if self.allowed_tools.contains(&call.name) {
                    self.tools.execute(call).await
                } else {
                    tracing::warn!(agent = %self.name, tool = %call.name, "tool not allowed for agent");
                    ToolResult::failure(&call.name, format!("Tool not available: {}", call.name))
                };
                results.push(Message::tool(call, result.output));
            }
            sink.emit(Update::subgraph(&namespace, "tools", results.clone()));
            messages.extend(results);
        }

        tracing::debug!(agent = %self.name, steps = self.max_steps, "tool budget spent, asking for final answer");
        let response = provider
            .chat(model, &messages, Some(self.model.options()))
            .await?;
        response.log_usage(&self.name);
        Ok(self.finish(response.content, &namespace, sink))
    }

    fn finish(&self, content: String, namespace: &str, sink: &UpdateSink) -> String {
        let reply = limit_sentences(&content, self.max_sentences);
        sink.emit(Update::subgraph(
            namespace,
            "agent",
            vec![Message::assistant(reply.clone()).with_name(&self.name)],
        ));
        reply
    }
}

impl std::fmt::Debug for WorkerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerAgent")
            .field("name", &self.name)
            .field("allowed_tools", &self.allowed_tools)
            .field("max_steps", &self.max_steps)
            .field("max_sentences", &self.max_sentences)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::update;
    use crate::core::{Role, ToolCall};
    use crate::llm::{Backend, LLMResponse, MockProvider};
    use serde_json::json;
    use tokio_stream::StreamExt;

    fn selection(mock: &MockProvider) -> ModelSelection {
        ModelSelection::custom(Backend::Local, Arc::new(mock.clone()), "mistral:7b", Some(0.0))
    }

    fn tool_call_response() -> LLMResponse {
        LLMResponse {
            tool_calls: vec![ToolCall::new("get_vehicle_state", json!({}))],
            ..LLMResponse::text("", "mock")
        }
    }

    #[tokio::test]
    async fn test_situation_agent_calls_tool_and_returns_one_sentence() {
        let mock = MockProvider::new(vec![
            tool_call_response(),
            LLMResponse::text(
                "The airbags deployed and the engine is off. Please stay calm.",
                "mock",
            ),
        ]);
        let agent =
            WorkerAgent::situation_agent(selection(&mock), Arc::new(ToolRegistry::new()), 3)
                .unwrap();

        let (sink, stream) = update::channel();
        let reply = agent.run(prompts::SITUATION_INSTRUCTION, &sink).await.unwrap();
        drop(sink);

        assert_eq!(reply, "The airbags deployed and the engine is off.");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tool_names, vec!["get_vehicle_state"]);
        assert_eq!(requests[0].system_prompt(), Some(prompts::SITUATION_PROMPT));
        assert_eq!(requests[0].temperature, Some(0.0));

        let tool_msg = requests[1].messages.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_0_0"));
        assert!(tool_msg.content.contains("\"airbags_activated\":true"));

        let updates: Vec<Update> = stream.collect().await;
        let nodes: Vec<&str> = updates.iter().map(|u| u.node.as_str()).collect();
        assert_eq!(nodes, vec!["agent", "tools", "agent"]);
        assert!(updates
            .iter()
            .all(|u| u.graph_id() == Some(prompts::SITUATION_AGENT)));
    }

    #[tokio::test]
    async fn test_empathetic_agent_has_no_tools_and_three_sentences() {
        let mock = MockProvider::with_replies(["One. Two. Three. Four."]);
        let agent = WorkerAgent::empathetic_agent(selection(&mock)).unwrap();
        assert!(agent.allowed_tools().is_empty());

        let (sink, _stream) = update::channel();
        let reply = agent.run("Rewrite: are you hurt?", &sink).await.unwrap();

        assert_eq!(reply, "One. Two. Three.");
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tool_names.is_empty());
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_budget_forces_final_answer() {
        let mock = MockProvider::new(vec![
            tool_call_response(),
            tool_call_response(),
            LLMResponse::text("The engine is off.", "mock"),
        ]);
        let agent =
            WorkerAgent::situation_agent(selection(&mock), Arc::new(ToolRegistry::new()), 2)
                .unwrap();

        let (sink, _stream) = update::channel();
        let reply = agent.run("status", &sink).await.unwrap();

        assert_eq!(reply, "The engine is off.");
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].tool_names.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_not_executed() {
        let mock = MockProvider::new(vec![
            LLMResponse {
                tool_calls: vec![ToolCall::new("get_vehicle_state", json!({})).with_id("x")],
                ..LLMResponse::text("", "mock")
            },
            LLMResponse::text("Done.", "mock"),
        ]);
        let agent = WorkerAgent::builder("rephraser")
            .model(selection(&mock))
            .max_steps(2)
            .build()
            .unwrap();

        let (sink, _stream) = update::channel();
        agent.run("hi", &sink).await.unwrap();

        let requests = mock.requests();
        let tool_msg = requests[1].messages.last().unwrap();
        assert!(tool_msg.content.contains("Tool not available"));
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_builder_rejects_unknown_tool() {
        let mock = MockProvider::default();
        let result = WorkerAgent::builder("x")
            .model(selection(&mock))
            .tools(Arc::new(ToolRegistry::new()))
            .allowed_tools(vec!["launch_rockets".into()])
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_propagates() {
        let mock = MockProvider::unreachable();
        let agent = WorkerAgent::empathetic_agent(selection(&mock)).unwrap();
        let (sink, _stream) = update::channel();

        let err = agent.run("hi", &sink).await.unwrap_err();
        assert!(matches!(err, EvanaError::BackendUnreachable { .. }));
    }
}
