//! Update rendering
//!
//! Normal mode shows the occupant only the supervisor's reply. Debug mode
//! prints the full trace, with worker subgraphs indented by a tab.

use std::io::{self, Write};

use crate::agent::Update;

/// Prefix of every user-facing reply
pub const ASSISTANT_MARKER: &str = "🚨 EVANA: ";

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateFormatter {
    debug: bool,
}

impl UpdateFormatter {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Write one update to `out`
    pub fn render(&self, update: &Update, out: &mut dyn Write) -> io::Result<()> {
        if update.messages.is_empty() {
            return Ok(());
        }
        if self.debug {
            self.render_trace(update, out)
        } else {
            self.render_reply(update, out)
        }
    }

    fn render_reply(&self, update: &Update, out: &mut dyn Write) -> io::Result<()> {
        match update.final_reply() {
            Some(reply) => writeln!(out, "\n{}{}\n", ASSISTANT_MARKER, reply.trim()),
            None => Ok(()),
        }
    }

    fn render_trace(&self, update: &Update, out: &mut dyn Write) -> io::Result<()> {
        let nested = update.is_subgraph();
        if let Some(graph_id) = update.graph_id() {
            writeln!(out, "Update from subgraph {}:\n", graph_id)?;
        }

        let label = format!("Update from node {}:", update.node);
        if nested {
            writeln!(out, "\t{}\n", label)?;
        } else {
            writeln!(out, "{}\n", label)?;
        }

        for message in &update.messages {
            let pretty = message.pretty();
            if nested {
                for line in pretty.split('\n') {
                    writeln!(out, "\t{}", line)?;
                }
            } else {
                writeln!(out, "{}", pretty)?;
            }
        }
        writeln!(out, "\n")
    }
}
