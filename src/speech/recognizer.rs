//! Speech-to-text

use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Why no text came back from the recognizer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Audio was captured but could not be understood
    #[error("speech was not understood")]
    UnknownValue,

    /// The recognition backend could not be reached or failed
    #[error("{0}")]
    RequestFailed(String),
}

/// Turns one spoken utterance into text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Block until one utterance has been captured and transcribed
    async fn listen(&self) -> Result<String, RecognitionError>;
}

/// Capture one utterance, never failing
///
/// Recognition errors print a fixed diagnostic to `out` and yield `""`.
pub async fn get_speech_input(
    recognizer: &dyn SpeechRecognizer,
    out: &mut (dyn Write + Send),
) -> String {
    match recognizer.listen().await {
        Ok(text) => text,
        Err(RecognitionError::UnknownValue) => {
            let _ = writeln!(out, "Sorry, I could not understand the audio.");
            String::new()
        }
        Err(RecognitionError::RequestFailed(e)) => {
            tracing::warn!(error = %e, "speech recognition request failed");
            let _ = writeln!(
                out,
                "Could not request results from the speech recognition service; {}",
                e
            );
            String::new()
        }
    }
}

/// Runs a program that records one utterance and prints the transcript
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` list
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self) -> Result<String, RecognitionError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RecognitionError::RequestFailed(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::RequestFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(RecognitionError::UnknownValue);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<String, RecognitionError>);

    #[async_trait]
    impl SpeechRecognizer for Fixed {
        async fn listen(&self) -> Result<String, RecognitionError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_unknown_value_degrades_to_empty() {
        let mut out = Vec::new();
        let text = get_speech_input(&Fixed(Err(RecognitionError::UnknownValue)), &mut out).await;

        assert_eq!(text, "");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Sorry, I could not understand the audio.\n"
        );
    }

    #[tokio::test]
    async fn test_request_failure_degrades_to_empty() {
        let mut out = Vec::new();
        let recognizer = Fixed(Err(RecognitionError::RequestFailed("connection refused".into())));
        let text = get_speech_input(&recognizer, &mut out).await;

        assert_eq!(text, "");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Could not request results from the speech recognition service; connection refused\n"
        );
    }

    #[tokio::test]
    async fn test_command_recognizer() {
        let ok = CommandRecognizer::new("echo", vec!["help me".into()]);
        assert_eq!(ok.listen().await, Ok("help me".to_string()));

        let silent = CommandRecognizer::new("true", vec![]);
        assert_eq!(silent.listen().await, Err(RecognitionError::UnknownValue));

        let failing = CommandRecognizer::new("false", vec![]);
        assert!(matches!(failing.listen().await, Err(RecognitionError::RequestFailed(_))));

        let missing = CommandRecognizer::new("evana-no-such-recognizer", vec![]);
        assert!(matches!(missing.listen().await, Err(RecognitionError::RequestFailed(_))));
    }
}
