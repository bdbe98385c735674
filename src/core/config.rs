//! Runtime configuration
//!
//! Built-in defaults are replaced section by section by
//! `~/.config/evana/config.toml`, then by environment variables (a `.env`
//! file is honoured), and finally by command-line flags in `main`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{EvanaError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub local: LocalModelConfig,
    /// Used instead of `local` when its credential is present
    #[serde(default)]
    pub hosted: HostedModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Local Ollama server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    /// 0.0 keeps local answers deterministic
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// OpenAI-compatible hosted backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedModelConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the variable holding the API key, not the key itself
    pub api_key_env: String,
    /// Left to the provider when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Show every agent update, not just the reply
    pub debug: bool,
    /// Messages kept per thread; older ones are dropped first
    pub max_history: usize,
    /// Model calls per worker invocation, tool rounds included
    pub worker_max_steps: usize,
    /// Probe the backend before the first prompt
    pub preflight: bool,
}

/// How the support script starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    /// Start on the first input
    Immediate,
    /// Wait for a trigger phrase
    Trigger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub entry: EntryMode,
    /// Case-insensitive phrases that wake the assistant in trigger mode
    pub trigger_phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Write `<thread>.json` after every turn
    pub checkpoint: bool,
    /// Defaults to the platform data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// External command printing the vehicle state as JSON; fixture when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_command: Option<Vec<String>>,
    pub telemetry_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Command that records one utterance and prints the transcript
    pub recognizer_command: Vec<String>,
    /// Command that reads text on stdin and writes raw 16-bit PCM to stdout
    pub synthesizer_command: Vec<String>,
    /// Command that plays raw PCM from stdin; `{rate}` is replaced by the sample rate
    pub player_command: Vec<String>,
    /// Treat a failed reply playback as fatal
    pub fail_on_synthesis_error: bool,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            model: "mistral:7b".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

impl Default for HostedModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4.1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: None,
            timeout_secs: 120,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_history: 200,
            worker_max_steps: 3,
            preflight: false,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            entry: EntryMode::Immediate,
            trigger_phrases: vec![
                "help".to_string(),
                "emergency".to_string(),
                "evana".to_string(),
            ],
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            telemetry_command: None,
            telemetry_timeout_ms: 2000,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recognizer_command: vec![
                "whisper-listen".to_string(),
                "--language".to_string(),
                "en".to_string(),
            ],
            synthesizer_command: vec![
                "piper".to_string(),
                "--output-raw".to_string(),
            ],
            player_command: vec![
                "aplay".to_string(),
                "-q".to_string(),
                "-r".to_string(),
                "{rate}".to_string(),
                "-f".to_string(),
                "S16_LE".to_string(),
                "-t".to_string(),
                "raw".to_string(),
                "-".to_string(),
            ],
            fail_on_synthesis_error: false,
        }
    }
}

impl Config {
    /// `~/.config/evana/config.toml`, or `./evana/config.toml` without a home
    pub fn config_file() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("evana")
            .join("config.toml")
    }

    /// The user's config file (or defaults), overlaid with the environment
    pub fn load() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::trace!("no .env loaded: {}", e);
        }

        let path = Self::config_file();
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::debug!(path = %path.display(), "falling back to defaults: {}", e);
            let mut config = Self::default();
            config.apply_env();
            config
        })
    }

    /// Read `path`, then let the environment override it
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EvanaError::config(format!("{} not found", path.display())))
            }
            Err(e) => return Err(EvanaError::config(format!("cannot read {}: {}", path.display(), e))),
        };

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| EvanaError::config(format!("{}: {}", path.display(), e)))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay `OLLAMA_HOST`, `OLLAMA_PORT`, `OPENAI_BASE_URL`,
    /// `EVANA_LOCAL_MODEL`, `EVANA_HOSTED_MODEL` and `DEBUG_AGENTS`
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("OLLAMA_HOST") {
            self.local.host = host;
        }
        match var("OLLAMA_PORT").map(|p| p.trim().parse::<u16>()) {
            Some(Ok(port)) => self.local.port = port,
            Some(Err(e)) => tracing::warn!("ignoring OLLAMA_PORT: {}", e),
            None => {}
        }
        if let Some(model) = var("EVANA_LOCAL_MODEL") {
            self.local.model = model;
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.hosted.base_url = url;
        }
        if let Some(model) = var("EVANA_HOSTED_MODEL") {
            self.hosted.model = model;
        }
        if let Some(flag) = var("DEBUG_AGENTS") {
            let flag = flag.trim();
            self.agent.debug = flag.eq_ignore_ascii_case("true") || flag == "1";
        }
    }

    /// Write as TOML, creating missing parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EvanaError::config(e.to_string()))
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.hosted.base_url).map_err(|e| {
            EvanaError::config(format!(
                "Invalid hosted base_url '{}': {}",
                self.hosted.base_url, e
            ))
        })?;

        if self.agent.worker_max_steps == 0 {
            return Err(EvanaError::config("agent.worker_max_steps must be at least 1"));
        }

        if self.speech.enabled
            && (self.speech.recognizer_command.is_empty()
                || self.speech.synthesizer_command.is_empty()
                || self.speech.player_command.is_empty())
        {
            return Err(EvanaError::config(
                "speech is enabled but a speech command is empty",
            ));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.local.host, self.local.port)
    }

    /// Directory holding conversation checkpoints
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.session.checkpoint_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("evana")
                .join("threads")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.local.port, 11434);
        assert_eq!(config.local.temperature, 0.0);
        assert_eq!(config.hosted.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.script.entry, EntryMode::Immediate);
        assert!(!config.session.checkpoint);
        assert_eq!(config.tools.telemetry_timeout_ms, 2000);
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.script.entry = EntryMode::Trigger;
        config.local.model = "llama3:8b".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.script.entry, EntryMode::Trigger);
        assert_eq!(loaded.local.model, "llama3:8b");
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[script]\nentry = \"trigger\"\ntrigger_phrases = [\"mayday\"]\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.script.trigger_phrases, vec!["mayday".to_string()]);
        assert_eq!(loaded.agent.worker_max_steps, 3);
    }

    #[test]
    fn test_defaults_ignore_environment() {
        let config = Config::default();
        assert_eq!(config.local.host, "localhost");
        assert_eq!(config.local.model, "mistral:7b");
        assert!(!config.agent.debug);
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();
        let mut config: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!config.agent.debug);

        let vars = [
            ("DEBUG_AGENTS", "TRUE"),
            ("OLLAMA_HOST", "10.0.0.7"),
            ("OLLAMA_PORT", "11500"),
            ("EVANA_LOCAL_MODEL", "llama3:8b"),
            ("EVANA_HOSTED_MODEL", ""),
        ];
        config.apply_vars(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        });

        assert!(config.agent.debug);
        assert_eq!(config.ollama_url(), "http://10.0.0.7:11500");
        assert_eq!(config.local.model, "llama3:8b");
        // empty values leave the file setting alone
        assert_eq!(config.hosted.model, "gpt-4.1");
    }

    #[test]
    fn test_debug_flag_values() {
        for (value, expected) in [("1", true), ("true", true), ("0", false), ("no", false)] {
            let mut config = Config::default();
            config.agent.debug = !expected;
            config.apply_vars(|key| (key == "DEBUG_AGENTS").then(|| value.to_string()));
            assert_eq!(config.agent.debug, expected, "DEBUG_AGENTS={}", value);
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = Config::default();
        config.hosted.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(EvanaError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::load_from(Path::new("/nonexistent/evana.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_checkpoint_dir_override() {
        let mut config = Config::default();
        config.session.checkpoint_dir = Some(PathBuf::from("/tmp/evana-threads"));
        assert_eq!(config.checkpoint_dir(), PathBuf::from("/tmp/evana-threads"));
    }
}
