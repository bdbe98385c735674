//! Agent module - supervisor, worker agents and conversation state
//!
//! Contains the support script, the agents that carry it out and the update
//! events a turn produces.

pub mod conversation;
pub mod prompts;
pub mod script;
pub mod session;
pub mod supervisor;
pub mod text;
pub mod update;
pub mod worker;

pub use conversation::Conversation;
pub use script::{EntryPolicy, ScriptState, SupportStep, TurnPlan};
pub use session::{Checkpoint, CheckpointStore, Session};
pub use supervisor::{Supervisor, TurnInput, TurnOutcome};
pub use update::{Update, UpdateSink, UpdateStream, SUPERVISOR};
pub use worker::{WorkerAgent, WorkerAgentBuilder};
