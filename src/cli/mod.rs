//! CLI module - command-line interface
//!
//! Contains the conversation loop, input sources, command parsing and the
//! update formatter.

pub mod commands;
pub mod format;
pub mod input;
pub mod repl;

pub use format::UpdateFormatter;
pub use input::{ConsoleInput, InputSource, ScriptedInput, SpeechInput};
pub use repl::Repl;
