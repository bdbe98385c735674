//! Supervisor - coordinates the worker agents through the support script
//!
//! One active turn runs a fixed pipeline:
//! 1. the code picks the script step (see [`ScriptState::plan`]);
//! 2. for the situation step only, the situation agent is asked once and its
//!    sentence is cached on the session;
//! 3. the supervisor model drafts the message for that step;
//! 4. the empathetic agent rewrites the draft, and that rewrite is the only
//!    text the occupant sees.
//!
//! Every stage is reported as an [`Update`]; the last update of an active
//! turn is a top-level `supervisor` update carrying the reply.

use serde_json::json;
use std::sync::Arc;
use tokio_stream::StreamExt;

use crate::agent::prompts;
use crate::agent::script::{EntryPolicy, SupportStep, TurnPlan};
use crate::agent::session::Session;
use crate::agent::update::{self, Update, UpdateSink, SUPERVISOR};
use crate::agent::worker::WorkerAgent;
use crate::core::{Config, Message, Result, Role, ToolCall};
use crate::llm::ModelSelection;
use crate::tools::ToolRegistry;

const UNAVAILABLE_SITUATION: &str = "Vehicle data is currently unavailable.";

/// What the caller hands to a turn
#[derive(Debug, Clone)]
pub enum TurnInput {
    /// Full transcript, replacing the session history
    History(Vec<Message>),
    /// A single new user message appended to the session
    Message(String),
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Waiting for a trigger phrase
    Standby,
    Replied { step: SupportStep, reply: String },
}

impl TurnOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            TurnOutcome::Standby => None,
            TurnOutcome::Replied { reply, .. } => Some(reply),
        }
    }
}

/// The coordinating agent
pub struct Supervisor {
    model: ModelSelection,
    registry: Arc<ToolRegistry>,
    situation: WorkerAgent,
    empathetic: WorkerAgent,
    entry: EntryPolicy,
}

impl Supervisor {
    pub fn new(config: &Config, model: ModelSelection, registry: Arc<ToolRegistry>) -> Result<Self> {
        let situation = WorkerAgent::situation_agent(
            model.clone(),
            Arc::clone(&registry),
            config.agent.worker_max_steps,
        )?;
        let empathetic = WorkerAgent::empathetic_agent(model.clone())?;

        Ok(Self {
            model,
            registry,
            situation,
            empathetic,
            entry: EntryPolicy::from_config(&config.script),
        })
    }

    pub fn with_entry(mut self, entry: EntryPolicy) -> Self {
        self.entry = entry;
        self
    }

    pub fn entry(&self) -> &EntryPolicy {
        &self.entry
    }

    pub fn model(&self) -> &ModelSelection {
        &self.model
    }

    /// Run one turn, emitting updates into `sink` as they happen
    pub async fn run_turn(
        &self,
        session: &mut Session,
        input: TurnInput,
        sink: &UpdateSink,
    ) -> Result<TurnOutcome> {
        match input {
            TurnInput::History(messages) => session.replace_history(messages),
            TurnInput::Message(content) => session.push_user(content),
        }
        let user_input = session.last_user_text();

        let step = match session.script().plan(&user_input, &self.entry) {
            TurnPlan::Standby => {
                tracing::debug!(thread = %session.thread_id(), "no trigger phrase, standing by");
                sink.emit(Update::node(SUPERVISOR, Vec::new()));
                session.save()?;
                return Ok(TurnOutcome::Standby);
            }
            TurnPlan::Step(step) => step,
        };
        tracing::info!(thread = %session.thread_id(), %step, "supervisor turn");

        let situation = match step {
            SupportStep::SituationSummary => Some(self.situation_summary(session, sink).await?),
            SupportStep::FreeForm => session.situation_summary().map(str::to_string),
            _ => None,
        };

        let draft = self.draft(session, step, situation.as_deref(), &user_input).await?;

        let mut reply = self
            .delegate(&self.empathetic, &prompts::rephrase_instruction(&draft), sink)
            .await?;
        if reply.is_empty() {
            tracing::warn!("empathetic agent returned nothing, forwarding draft");
            reply = draft;
        }

        let message = Message::assistant(reply.clone()).with_name(SUPERVISOR);
        sink.emit(Update::node(SUPERVISOR, vec![message.clone()]));
        session.push(message);
        session.script_mut().commit(step);
        session.save()?;

        Ok(TurnOutcome::Replied { step, reply })
    }

    /// Run one turn and collect its updates
    pub async fn invoke(
        &self,
        session: &mut Session,
        input: TurnInput,
    ) -> Result<(TurnOutcome, Vec<Update>)> {
        let (sink, stream) = update::channel();
        let outcome = self.run_turn(session, input, &sink).await?;
        drop(sink);
        Ok((outcome, stream.collect().await))
    }

    /// Cached vehicle sentence, asking the situation agent at most once
    async fn situation_summary(&self, session: &mut Session, sink: &UpdateSink) -> Result<String> {
        if let Some(summary) = session.situation_summary() {
            return Ok(summary.to_string());
        }

        let mut summary = self
            .delegate(&self.situation, prompts::SITUATION_INSTRUCTION, sink)
            .await?;
        if summary.is_empty() {
            tracing::warn!("situation agent returned nothing, describing the reading directly");
            summary = match self.registry.vehicle().read().await.state {
                Some(state) => state.describe(),
                None => UNAVAILABLE_SITUATION.to_string(),
            };
        }
        session.set_situation_summary(summary.clone());
        Ok(summary)
    }

    /// The supervisor's own model call; its output never reaches the occupant directly
    async fn draft(
        &self,
        session: &Session,
        step: SupportStep,
        situation: Option<&str>,
        user_input: &str,
    ) -> Result<String> {
        let mut messages = vec![Message::system(prompts::SUPERVISOR_PROMPT)];
        messages.extend(
            session
                .messages()
                .into_iter()
                .filter(|m| matches!(m.role, Role::User | Role::Assistant) && !m.has_tool_calls()),
        );
        messages.push(Message::user(prompts::supervisor_brief(step, situation, user_input)));

        let response = self
            .model
            .provider()
            .chat(self.model.model(), &messages, Some(self.model.options()))
            .await?;
        response.log_usage(SUPERVISOR);

        let draft = response.content.trim();
        if draft.is_empty() {
            tracing::warn!(%step, "empty draft, using the step's default wording");
            return Ok(prompts::step_fallback(step, situation));
        }
        Ok(draft.to_string())
    }

    /// Hand `instruction` to a worker and report the round trip
    async fn delegate(
        &self,
        worker: &WorkerAgent,
        instruction: &str,
        sink: &UpdateSink,
    ) -> Result<String> {
        let name = worker.name();

        let handoff = ToolCall::new(
            format!("transfer_to_{}", name),
            json!({ "instruction": instruction }),
        )
        .with_id(format!("transfer_to_{}", name));
        sink.emit(Update::node(
            SUPERVISOR,
            vec![
                Message::tool_request(vec![handoff.clone()]).with_name(SUPERVISOR),
                Message::tool(&handoff, format!("Successfully transferred to {}", name)),
            ],
        ));

        let reply = worker.run(instruction, sink).await?;

        let back = ToolCall::new("transfer_back_to_supervisor", json!({}))
            .with_id(format!("transfer_back_from_{}", name));
        sink.emit(Update::node(
            name,
            vec![
                Message::assistant(reply.clone()).with_name(name),
                Message::tool_request(vec![back.clone()]).with_name(name),
                Message::tool(&back, "Successfully transferred back to supervisor"),
            ],
        ));

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::text::sentence_count;
    use crate::core::EvanaError;
    use crate::llm::{Backend, MockProvider};

    fn supervisor(mock: &MockProvider) -> Supervisor {
        let model =
            ModelSelection::custom(Backend::Local, Arc::new(mock.clone()), "mistral:7b", Some(0.0));
        Supervisor::new(&Config::default(), model, Arc::new(ToolRegistry::new())).unwrap()
    }

    #[tokio::test]
    async fn test_first_turn_pipeline() {
        let mock = MockProvider::with_replies([
            "The airbags have deployed and the engine is off.",
            "Tell them the airbags deployed and the engine is off.",
            "I'm here with you. Your airbags deployed and the engine is off.",
        ]);
        let sup = supervisor(&mock);
        let mut session = Session::new(50);

        let (outcome, updates) = sup
            .invoke(&mut session, TurnInput::Message("help".into()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Replied {
                step: SupportStep::SituationSummary,
                reply: "I'm here with you. Your airbags deployed and the engine is off.".into(),
            }
        );

        // situation agent, supervisor draft, empathetic agent
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].system_prompt(), Some(prompts::SITUATION_PROMPT));
        assert_eq!(requests[1].system_prompt(), Some(prompts::SUPERVISOR_PROMPT));
        assert_eq!(requests[2].system_prompt(), Some(prompts::EMPATHETIC_PROMPT));
        assert!(requests[2].messages[1].content.contains("Tell them the airbags"));

        let last = updates.last().unwrap();
        assert_eq!(
            last.final_reply(),
            Some("I'm here with you. Your airbags deployed and the engine is off.")
        );
        let finals: Vec<_> = updates.iter().filter_map(|u| u.final_reply()).collect();
        assert_eq!(finals.len(), 1);

        assert_eq!(session.script().current(), SupportStep::SituationSummary);
        assert_eq!(
            session.situation_summary(),
            Some("The airbags have deployed and the engine is off.")
        );
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn test_update_order_and_attribution() {
        let mock = MockProvider::with_replies(["Engine off.", "Draft.", "Reply."]);
        let sup = supervisor(&mock);
        let mut session = Session::new(50);

        let (_, updates) = sup
            .invoke(&mut session, TurnInput::Message("help".into()))
            .await
            .unwrap();

        let labels: Vec<String> = updates
            .iter()
            .map(|u| match u.graph_id() {
                Some(id) => format!("{}/{}", id, u.node),
                None => u.node.clone(),
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                "supervisor",
                "is_situation_agent/agent",
                "is_situation_agent",
                "supervisor",
                "empathetic_agent/agent",
                "empathetic_agent",
                "supervisor",
            ]
        );
    }

    #[tokio::test]
    async fn test_situation_agent_called_once_per_session() {
        let mock = MockProvider::with_replies([
            "The engine is off.",
            "draft one",
            "reply one",
            "draft two",
            "reply two",
        ]);
        let sup = supervisor(&mock);
        let mut session = Session::new(50);

        sup.invoke(&mut session, TurnInput::Message("help".into()))
            .await
            .unwrap();
        let (outcome, _) = sup
            .invoke(&mut session, TurnInput::Message("I'm okay".into()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Replied {
                step: SupportStep::EmotionalCheck,
                reply: "reply two".into()
            }
        );
        let situation_calls = mock
            .requests()
            .iter()
            .filter(|r| r.system_prompt() == Some(prompts::SITUATION_PROMPT))
            .count();
        assert_eq!(situation_calls, 1);
    }

    #[tokio::test]
    async fn test_empty_model_output_falls_back() {
        // every call returns empty text
        let mock = MockProvider::default();
        let sup = supervisor(&mock);
        let mut session = Session::new(50);

        let (outcome, _) = sup
            .invoke(&mut session, TurnInput::Message("help".into()))
            .await
            .unwrap();

        let summary = session.situation_summary().unwrap().to_string();
        assert_eq!(summary, crate::tools::get_vehicle_state().describe());
        assert_eq!(sentence_count(&summary), 1);

        let reply = outcome.reply().unwrap();
        assert!(reply.starts_with("I'm here with you."));
        assert!(reply.contains(&summary));
    }

    #[tokio::test]
    async fn test_trigger_mode_stands_by() {
        let mock = MockProvider::with_replies(["x"]);
        let sup = supervisor(&mock).with_entry(EntryPolicy::trigger(["help", "evana"]));
        let mut session = Session::new(50);

        let (outcome, updates) = sup
            .invoke(&mut session, TurnInput::Message("good morning".into()))
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Standby);
        assert_eq!(updates, vec![Update::node(SUPERVISOR, vec![])]);
        assert!(mock.requests().is_empty());
        assert!(!session.script().started());
    }

    #[tokio::test]
    async fn test_history_input_replaces_transcript() {
        let mock = MockProvider::with_replies(["s", "d", "r"]);
        let sup = supervisor(&mock);
        let mut session = Session::new(50);

        let history = vec![
            Message::user("first"),
            Message::assistant("earlier reply"),
            Message::user("second"),
        ];
        sup.invoke(&mut session, TurnInput::History(history))
            .await
            .unwrap();

        let draft_request = &mock.requests()[1];
        // system, three history messages, brief
        assert_eq!(draft_request.messages.len(), 5);
        assert!(draft_request.messages[4].content.contains("Occupant's last message: second"));
        assert_eq!(session.len(), 4);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let sup = supervisor(&MockProvider::unreachable());
        let mut session = Session::new(50);

        let err = sup
            .invoke(&mut session, TurnInput::Message("help".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, EvanaError::BackendUnreachable { .. }));
        assert!(!session.script().started());
    }
}
