//! Conversation sessions and their checkpoints
//!
//! A [`Session`] owns one conversation thread: its id, history, script
//! progress and the cached vehicle summary. With a [`CheckpointStore`]
//! attached, the session is written to disk after every turn and can be
//! resumed by thread id.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::agent::conversation::Conversation;
use crate::agent::script::ScriptState;
use crate::core::{Config, EvanaError, Message, Result};

/// Persisted form of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub script: ScriptState,
    #[serde(default)]
    pub situation_summary: Option<String>,
}

/// Directory of `<thread_id>.json` checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf> {
        validate_thread_id(thread_id)?;
        Ok(self.dir.join(format!("{}.json", thread_id)))
    }

    /// Load a checkpoint; `Ok(None)` if the thread has none yet
    pub fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(thread_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content).map_err(|e| {
            EvanaError::checkpoint(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        if checkpoint.thread_id != thread_id {
            return Err(EvanaError::checkpoint(format!(
                "{} belongs to thread {}",
                path.display(),
                checkpoint.thread_id
            )));
        }
        Ok(Some(checkpoint))
    }

    /// Write a checkpoint, replacing the previous one atomically
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path_for(&checkpoint.thread_id)?;
        std::fs::create_dir_all(&self.dir)?;

        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(path = %path.display(), "checkpoint saved");
        Ok(())
    }
}

fn validate_thread_id(thread_id: &str) -> Result<()> {
    let valid = !thread_id.is_empty()
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EvanaError::checkpoint(format!("Invalid thread id: {:?}", thread_id)))
    }
}

/// One conversation thread
#[derive(Debug, Clone)]
pub struct Session {
    thread_id: String,
    conversation: Conversation,
    script: ScriptState,
    situation_summary: Option<String>,
    store: Option<CheckpointStore>,
}

impl Session {
    /// Fresh in-memory session with a new thread id
    pub fn new(max_history: usize) -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            conversation: Conversation::new(max_history),
            script: ScriptState::new(),
            situation_summary: None,
            store: None,
        }
    }

    /// Checkpointed session; resumes `thread_id` when its checkpoint exists
    pub fn checkpointed(
        store: CheckpointStore,
        thread_id: Option<String>,
        max_history: usize,
    ) -> Result<Self> {
        let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut session = Self {
            thread_id,
            conversation: Conversation::new(max_history),
            script: ScriptState::new(),
            situation_summary: None,
            store: None,
        };

        if let Some(checkpoint) = store.load(&session.thread_id)? {
            tracing::info!(
                thread = %session.thread_id,
                messages = checkpoint.messages.len(),
                "resuming checkpoint"
            );
            session.conversation = Conversation::from_messages(checkpoint.messages, max_history);
            session.script = checkpoint.script;
            session.situation_summary = checkpoint.situation_summary;
        }
        session.store = Some(store);
        Ok(session)
    }

    /// Session as configured: checkpointed when enabled, in-memory otherwise
    pub fn from_config(config: &Config, thread_id: Option<String>) -> Result<Self> {
        let max_history = config.agent.max_history;
        if config.session.checkpoint {
            let store = CheckpointStore::new(config.checkpoint_dir());
            return Self::checkpointed(store, thread_id, max_history);
        }
        if thread_id.is_some() {
            tracing::warn!("thread id ignored, checkpointing is disabled");
        }
        Ok(Self::new(max_history))
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn is_checkpointed(&self) -> bool {
        self.store.is_some()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.conversation.messages()
    }

    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }

    pub fn script(&self) -> &ScriptState {
        &self.script
    }

    pub fn script_mut(&mut self) -> &mut ScriptState {
        &mut self.script
    }

    pub fn situation_summary(&self) -> Option<&str> {
        self.situation_summary.as_deref()
    }

    pub fn set_situation_summary(&mut self, summary: impl Into<String>) {
        self.situation_summary = Some(summary.into());
    }

    /// Replace the history with a caller-supplied transcript
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        self.conversation.replace(messages);
    }

    pub fn push(&mut self, message: Message) {
        self.conversation.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Content of the most recent user message, empty if none
    pub fn last_user_text(&self) -> String {
        self.conversation
            .last_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            thread_id: self.thread_id.clone(),
            messages: self.conversation.messages(),
            script: self.script.clone(),
            situation_summary: self.situation_summary.clone(),
        }
    }

    /// Persist if checkpointing is enabled
    pub fn save(&self) -> Result<()> {
        match self.store {
            Some(ref store) => store.save(&self.checkpoint()),
            None => Ok(()),
        }
    }

    /// Start over on a new thread, keeping the checkpoint store
    pub fn reset(&mut self) {
        self.thread_id = Uuid::new_v4().to_string();
        self.conversation.clear();
        self.script.reset();
        self.situation_summary = None;
    }
}
