//! LLM module - Language Model integrations
//!
//! Provides a provider abstraction with a local Ollama backend, a hosted
//! OpenAI-compatible backend, and the selector that picks between them.

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod traits;

pub use mock::MockProvider;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use provider::{select_from_env, select_provider, Backend, ModelSelection};
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
