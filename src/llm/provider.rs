//! Model provider selection
//!
//! Picks the hosted backend when its API key is present in the environment and
//! falls back to the local Ollama server otherwise. Selection never touches the
//! network; an unreachable backend surfaces on the first call (or on
//! [`ModelSelection::preflight`] when requested).

use std::env;
use std::sync::Arc;

use crate::core::{Config, EvanaError, Result};
use crate::llm::ollama::OllamaClient;
use crate::llm::openai::OpenAiClient;
use crate::llm::traits::{GenerateOptions, LLMProvider};

/// Which kind of backend was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Local Ollama server
    Local,
    /// Hosted OpenAI-compatible API
    Hosted,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Hosted => write!(f, "hosted"),
        }
    }
}

/// The model handle shared by every agent
#[derive(Clone)]
pub struct ModelSelection {
    backend: Backend,
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: Option<f32>,
    /// Credential variable consulted at selection, `None` for custom providers
    key_env: Option<String>,
    notice: String,
}

impl ModelSelection {
    /// Wrap an arbitrary provider (used with scripted providers)
    pub fn custom(
        backend: Backend,
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        temperature: Option<f32>,
    ) -> Self {
        Self::assemble(backend, provider, model.into(), temperature, None)
    }

    fn assemble(
        backend: Backend,
        provider: Arc<dyn LLMProvider>,
        model: String,
        temperature: Option<f32>,
        key_env: Option<String>,
    ) -> Self {
        let mut selection = Self {
            backend,
            provider,
            model,
            temperature,
            key_env,
            notice: String::new(),
        };
        selection.notice = selection.compose_notice();
        selection
    }

    fn compose_notice(&self) -> String {
        match (self.key_env.as_deref(), self.backend) {
            (Some(var), Backend::Local) => format!(
                "Environment variable {} is not set. Fallback to local ollama server using {} model.",
                var, self.model
            ),
            (Some(var), Backend::Hosted) => {
                format!("Using OpenAI API key from environment variable {}.", var)
            }
            (None, _) => format!(
                "Using {} model {} via {}.",
                self.backend,
                self.model,
                self.provider.name()
            ),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn provider(&self) -> Arc<dyn LLMProvider> {
        Arc::clone(&self.provider)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Line printed at startup describing the selection
    pub fn notice(&self) -> &str {
        &self.notice
    }

    /// Override the model identifier (CLI `--model`)
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        self.notice = self.compose_notice();
    }

    /// Generation options with the selected temperature
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.temperature,
            ..Default::default()
        }
    }

    /// Verify the backend answers and serves the selected model
    pub async fn preflight(&self) -> Result<()> {
        if self.provider.is_model_available(&self.model).await? {
            tracing::info!(model = %self.model, backend = %self.backend, "preflight ok");
            Ok(())
        } else {
            Err(EvanaError::ModelNotFound(self.model.clone()))
        }
    }
}

impl std::fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelection")
            .field("backend", &self.backend)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Read the hosted credential named by the config; empty values count as absent
pub fn hosted_api_key(config: &Config) -> Option<String> {
    env::var(&config.hosted.api_key_env)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Select a backend from the process environment
pub fn select_from_env(config: &Config) -> Result<ModelSelection> {
    select_provider(config, hosted_api_key(config))
}

/// Select a backend given the (possibly absent) hosted credential
pub fn select_provider(config: &Config, api_key: Option<String>) -> Result<ModelSelection> {
    let key_env = Some(config.hosted.api_key_env.clone());
    let selection = match api_key {
        None => ModelSelection::assemble(
            Backend::Local,
            Arc::new(OllamaClient::from_config(config)?),
            config.local.model.clone(),
            Some(config.local.temperature),
            key_env,
        ),
        Some(key) => ModelSelection::assemble(
            Backend::Hosted,
            Arc::new(OpenAiClient::from_config(config, key)?),
            config.hosted.model.clone(),
            config.hosted.temperature,
            key_env,
        ),
    };

    tracing::debug!(?selection, "model provider selected");
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;

    #[test]
    fn test_model_override_updates_notice() {
        let mut selection = select_provider(&Config::default(), None).unwrap();
        selection.set_model("llama3:8b");

        assert_eq!(selection.model(), "llama3:8b");
        assert_eq!(
            selection.notice(),
            "Environment variable OPENAI_API_KEY is not set. Fallback to local ollama server using llama3:8b model."
        );
    }

    #[test]
    fn test_missing_key_selects_local_backend() {
        let config = Config::default();
        let selection = select_provider(&config, None).unwrap();

        assert_eq!(selection.backend(), Backend::Local);
        assert_eq!(selection.provider().name(), "ollama");
        assert_eq!(selection.model(), config.local.model);
        assert_eq!(selection.temperature(), Some(0.0));
        assert!(selection.notice().contains("is not set"));
        assert!(selection.notice().contains("Fallback to local ollama server"));
    }

    #[test]
    fn test_present_key_selects_hosted_backend() {
        let selection = select_provider(&Config::default(), Some("sk-test".into())).unwrap();

        assert_eq!(selection.backend(), Backend::Hosted);
        assert_eq!(selection.provider().name(), "openai");
        assert!(selection.notice().starts_with("Using OpenAI API key"));
    }

    #[test]
    fn test_notice_names_configured_variable() {
        let mut config = Config::default();
        config.hosted.api_key_env = "EVANA_TEST_UNSET_KEY_7731".to_string();
        let selection = select_from_env(&config).unwrap();
        assert_eq!(selection.backend(), Backend::Local);
        assert!(selection.notice().contains("EVANA_TEST_UNSET_KEY_7731"));
    }

    #[tokio::test]
    async fn test_preflight_reports_unreachable_backend() {
        let selection = ModelSelection::custom(
            Backend::Local,
            Arc::new(MockProvider::unreachable()),
            "mistral:7b",
            Some(0.0),
        );
        assert!(matches!(
            selection.preflight().await,
            Err(EvanaError::BackendUnreachable { .. })
        ));
    }
}
