//! Where user input comes from
//!
//! The loop reads through [`InputSource`] so the console, the microphone and
//! scripted transcripts are interchangeable.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::core::Result;
use crate::speech::{get_speech_input, SpeechRecognizer};

/// A source of user turns
#[async_trait]
pub trait InputSource: Send {
    /// Show `prompt` on `out` and read one input; `None` at end of input
    async fn read_line(
        &mut self,
        prompt: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<Option<String>>;

    /// Whether an empty first input means "ask again" rather than "nothing to say"
    fn reprompts_on_empty(&self) -> bool {
        false
    }
}

/// Lines typed on stdin
pub struct ConsoleInput {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for ConsoleInput {
    async fn read_line(
        &mut self,
        prompt: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<Option<String>> {
        write!(out, "{}", prompt)?;
        out.flush()?;
        Ok(self.lines.next_line().await?)
    }
}

/// Spoken input; recognition failures become empty turns
pub struct SpeechInput {
    recognizer: Box<dyn SpeechRecognizer>,
}

impl SpeechInput {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self { recognizer }
    }
}

#[async_trait]
impl InputSource for SpeechInput {
    async fn read_line(
        &mut self,
        prompt: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<Option<String>> {
        write!(out, "{}", prompt)?;
        out.flush()?;
        let text = get_speech_input(self.recognizer.as_ref(), out).await;
        if !text.is_empty() {
            writeln!(out, "{}", text)?;
        }
        Ok(Some(text))
    }

    /// Failed recognition comes back empty
    fn reprompts_on_empty(&self) -> bool {
        true
    }
}

/// Fixed list of inputs, echoed after the prompt
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn read_line(
        &mut self,
        prompt: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<Option<String>> {
        write!(out, "{}", prompt)?;
        match self.lines.pop_front() {
            Some(line) => {
                writeln!(out, "{}", line)?;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }
}
