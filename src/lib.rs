//! EVANA - post-accident vehicle assistant
//!
//! Guides a vehicle occupant through a support script after an accident or
//! a breakdown. A supervisor picks the script step, a situation agent reads
//! the vehicle state and an empathetic agent phrases every reply.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction with Ollama and OpenAI-compatible backends
//! - **Tools**: The vehicle-state tool and its registry
//! - **Agent**: Support script, supervisor, worker agents and sessions
//! - **Speech**: External speech recognition and synthesis
//! - **CLI**: Conversation loop and update formatter
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evana::agent::{Session, Supervisor, TurnInput};
//! use evana::tools::ToolRegistry;
//! use evana::{select_from_env, Config};
//!
//! #[tokio::main]
//! async fn main() -> evana::Result<()> {
//!     let config = Config::load();
//!     let model = select_from_env(&config)?;
//!     let supervisor = Supervisor::new(&config, model, Arc::new(ToolRegistry::new()))?;
//!
//!     let mut session = Session::new(config.agent.max_history);
//!     let (outcome, _updates) = supervisor
//!         .invoke(&mut session, TurnInput::Message("help".into()))
//!         .await?;
//!     println!("{:?}", outcome.reply());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod speech;
pub mod tools;

// Re-export commonly used items
pub use agent::{Session, Supervisor};
pub use cli::Repl;
pub use core::{Config, EvanaError, Result};
pub use llm::{select_from_env, select_provider};
