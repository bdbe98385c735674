//! Text-to-speech
//!
//! [`CommandSynthesizer`] feeds the text to a synthesis program, collects the
//! raw audio it prints and plays it through a player program. Capture and
//! playback are sequential; `speak` returns once playback has finished.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Playback sample rate in Hz
pub const SAMPLE_RATE: u32 = 24_000;

/// Why a reply could not be spoken
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// Synthesis or playback program is missing
    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("audio playback failed: {0}")]
    PlaybackFailed(String),
}

/// Speaks text aloud
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError>;
}

/// Synthesis program piped into a player program
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    synthesizer: Vec<String>,
    player: Vec<String>,
}

impl CommandSynthesizer {
    /// `player` may contain `{rate}`, replaced by [`SAMPLE_RATE`]
    pub fn new(synthesizer: Vec<String>, player: Vec<String>) -> Self {
        Self {
            synthesizer,
            player,
        }
    }

    fn player_argv(&self) -> Vec<String> {
        let rate = SAMPLE_RATE.to_string();
        self.player
            .iter()
            .map(|arg| arg.replace("{rate}", &rate))
            .collect()
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let (program, args) = self
            .synthesizer
            .split_first()
            .ok_or_else(|| SynthesisError::EngineUnavailable("no synthesizer configured".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| SynthesisError::SynthesisFailed(format!("{}: {}", program, e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SynthesisError::SynthesisFailed(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            return Err(SynthesisError::SynthesisFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(SynthesisError::SynthesisFailed(format!(
                "{} produced no audio",
                program
            )));
        }
        Ok(output.stdout)
    }

    async fn play(&self, audio: &[u8]) -> Result<(), SynthesisError> {
        let argv = self.player_argv();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SynthesisError::EngineUnavailable("no audio player configured".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(audio)
                .await
                .map_err(|e| SynthesisError::PlaybackFailed(format!("{}: {}", program, e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SynthesisError::PlaybackFailed(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            return Err(SynthesisError::PlaybackFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> SynthesisError {
    if e.kind() == ErrorKind::NotFound {
        SynthesisError::EngineUnavailable(program.to_string())
    } else {
        SynthesisError::SynthesisFailed(format!("failed to run {}: {}", program, e))
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let audio = self.synthesize(text).await?;
        tracing::debug!(bytes = audio.len(), rate = SAMPLE_RATE, "playing synthesized speech");
        self.play(&audio).await
    }
}
