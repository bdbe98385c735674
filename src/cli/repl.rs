//! Conversation loop
//!
//! Reads one input per turn, hands it to the supervisor, renders the update
//! stream while the turn runs and speaks the reply when speech is enabled.

use std::io::{self, Write};
use std::sync::Arc;
use tokio_stream::StreamExt;

use crate::agent::{update, Conversation, Session, Supervisor, TurnInput};
use crate::cli::commands::{help_text, parse_command, Command};
use crate::cli::format::UpdateFormatter;
use crate::cli::input::{ConsoleInput, InputSource, SpeechInput};
use crate::core::{Config, EvanaError, Message, Result};
use crate::llm::ModelSelection;
use crate::speech::{CommandRecognizer, CommandSynthesizer, SpeechSynthesizer};
use crate::tools::ToolRegistry;

const FIRST_PROMPT: &str = "You (initial message): ";
const PROMPT: &str = "\nYou: ";

/// Interactive conversation loop
pub struct Repl {
    supervisor: Supervisor,
    session: Session,
    formatter: UpdateFormatter,
    input: Box<dyn InputSource>,
    output: Box<dyn Write + Send>,
    synthesizer: Option<Box<dyn SpeechSynthesizer>>,
    fail_on_synthesis_error: bool,
    /// Transcript re-sent every turn when not checkpointing, bounded like the session
    history: Conversation,
}

impl Repl {
    /// Build the loop from configuration, reading the console or the microphone
    pub fn new(config: &Config, model: ModelSelection, session: Session) -> Result<Self> {
        let registry = Arc::new(ToolRegistry::from_config(config));
        let supervisor = Supervisor::new(config, model, registry)?;

        let mut repl = Self {
            supervisor,
            session,
            formatter: UpdateFormatter::new(config.agent.debug),
            input: Box::new(ConsoleInput::new()),
            output: Box::new(io::stdout()),
            synthesizer: None,
            fail_on_synthesis_error: config.speech.fail_on_synthesis_error,
            history: Conversation::new(config.agent.max_history),
        };

        if config.speech.enabled {
            let recognizer = CommandRecognizer::from_argv(&config.speech.recognizer_command)
                .ok_or_else(|| EvanaError::config("speech.recognizer_command is empty"))?;
            repl.input = Box::new(SpeechInput::new(Box::new(recognizer)));
            repl.synthesizer = Some(Box::new(CommandSynthesizer::new(
                config.speech.synthesizer_command.clone(),
                config.speech.player_command.clone(),
            )));
        }

        Ok(repl)
    }

    pub fn with_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.output = output;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Box<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until exit, interrupt or end of input
    pub async fn run(&mut self) -> Result<()> {
        let notice = self.supervisor.model().notice().to_string();
        writeln!(self.output, "{}", notice)?;

        let interrupted = tokio::select! {
            result = self.converse() => {
                result?;
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted {
            writeln!(self.output, "\nConversation ended.")?;
            self.output.flush()?;
        }
        Ok(())
    }

    /// Answer a single message and return (`--prompt` mode)
    pub async fn run_once(&mut self, text: &str) -> Result<()> {
        let notice = self.supervisor.model().notice().to_string();
        writeln!(self.output, "{}", notice)?;
        self.turn(text.trim().to_string()).await
    }

    async fn converse(&mut self) -> Result<()> {
        let mut first = true;

        loop {
            let prompt = if first { FIRST_PROMPT } else { PROMPT };
            let line = match self.input.read_line(prompt, &mut *self.output).await? {
                Some(line) => line,
                None => {
                    writeln!(self.output, "\nConversation ended.")?;
                    return Ok(());
                }
            };

            let text = match parse_command(&line) {
                Command::Exit => {
                    writeln!(self.output, "Exiting conversation.")?;
                    return Ok(());
                }
                Command::Message(text) => text,
                command => {
                    let reply = self.execute(command);
                    writeln!(self.output, "{}", reply)?;
                    continue;
                }
            };

            if first && text.is_empty() {
                if self.input.reprompts_on_empty() {
                    continue;
                }
                writeln!(self.output, "No input received. Exiting.")?;
                return Ok(());
            }
            first = false;

            self.turn(text).await?;
        }
    }

    /// One supervisor turn, rendering updates as they arrive
    async fn turn(&mut self, text: String) -> Result<()> {
        let input = if self.session.is_checkpointed() {
            TurnInput::Message(text)
        } else {
            self.history.push(Message::user(text));
            TurnInput::History(self.history.messages())
        };

        let (sink, mut stream) = update::channel();
        let supervisor = &self.supervisor;
        let session = &mut self.session;
        let output = &mut self.output;
        let formatter = self.formatter;

        let produce = async move {
            let outcome = supervisor.run_turn(session, input, &sink).await;
            drop(sink);
            outcome
        };
        let consume = async {
            while let Some(update) = stream.next().await {
                formatter.render(&update, &mut **output)?;
            }
            output.flush()
        };
        let (outcome, rendered) = tokio::join!(produce, consume);
        let outcome = outcome?;
        rendered?;

        let Some(reply) = outcome.reply() else {
            return Ok(());
        };
        if !self.session.is_checkpointed() {
            self.history.push(Message::assistant(reply));
        }

        if let Some(ref synthesizer) = self.synthesizer {
            if let Err(e) = synthesizer.speak(reply).await {
                if self.fail_on_synthesis_error {
                    return Err(EvanaError::Speech(e.to_string()));
                }
                tracing::warn!(error = %e, "could not speak reply");
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: Command) -> String {
        match command {
            Command::Help => help_text(),
            Command::Status => self.status(),
            Command::Debug => {
                let debug = !self.formatter.debug();
                self.formatter.set_debug(debug);
                format!("Debug mode: {}", if debug { "ON" } else { "OFF" })
            }
            Command::Reset => {
                self.session.reset();
                self.history.clear();
                format!("Conversation reset. Thread: {}", self.session.thread_id())
            }
            Command::Thread => format!("Thread: {}", self.session.thread_id()),
            Command::Unknown(cmd) => {
                format!("Unknown command: {}. Type /help for available commands.", cmd)
            }
            Command::Exit | Command::Message(_) => String::new(),
        }
    }

    fn status(&self) -> String {
        let model = self.supervisor.model();
        let script = self.session.script();
        format!(
            "EVANA Status:\n\
             ─────────────────────────────\n\
             Backend:    {} ({})\n\
             Model:      {}\n\
             Thread:     {}\n\
             Checkpoint: {}\n\
             Entry:      {:?}\n\
             Step:       {} ({} of {} done)\n\
             History:    {} messages\n\
             Debug:      {}",
            model.backend(),
            model.provider().name(),
            model.model(),
            self.session.thread_id(),
            if self.session.is_checkpointed() { "on" } else { "off" },
            self.supervisor.entry().mode(),
            script.current(),
            script.completed().len(),
            crate::agent::SupportStep::SEQUENCE.len(),
            self.session.len(),
            if self.formatter.debug() { "on" } else { "off" }
        )
    }
}
