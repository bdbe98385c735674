//! Incremental updates emitted while the supervisor handles a turn
//!
//! A turn produces a finite, ordered sequence of [`Update`]s. Each update is
//! attributed to exactly one node; a non-empty namespace marks updates from
//! inside a worker agent.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::core::Message;

/// Node name of the coordinating agent
pub const SUPERVISOR: &str = "supervisor";

/// One event of a supervisor turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Subgraph path, empty for top-level nodes
    #[serde(default)]
    pub namespace: Vec<String>,
    /// Node that produced the messages
    pub node: String,
    pub messages: Vec<Message>,
}

impl Update {
    /// Top-level update
    pub fn node(node: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            namespace: Vec::new(),
            node: node.into(),
            messages,
        }
    }

    /// Update from inside a worker subgraph
    pub fn subgraph(namespace: impl Into<String>, node: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            namespace: vec![namespace.into()],
            node: node.into(),
            messages,
        }
    }

    pub fn is_subgraph(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Graph id of the innermost namespace segment (`name:task` → `name`)
    pub fn graph_id(&self) -> Option<&str> {
        self.namespace
            .last()
            .map(|ns| ns.split(':').next().unwrap_or(ns.as_str()))
    }

    pub fn final_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// User-facing reply carried by this update, if it is the supervisor's final one
    pub fn final_reply(&self) -> Option<&str> {
        if self.is_subgraph() || self.node != SUPERVISOR {
            return None;
        }
        self.final_message()
            .filter(|m| m.is_assistant() && !m.has_tool_calls())
            .map(|m| m.content.as_str())
    }
}

/// Producer side of a turn's update stream
#[derive(Debug, Clone)]
pub struct UpdateSink {
    tx: mpsc::UnboundedSender<Update>,
}

/// Consumer side of a turn's update stream
pub type UpdateStream = UnboundedReceiverStream<Update>;

impl UpdateSink {
    pub fn emit(&self, update: Update) {
        if self.tx.send(update).is_err() {
            tracing::trace!("update dropped, stream closed");
        }
    }
}

/// Create a connected sink/stream pair for one turn
pub fn channel() -> (UpdateSink, UpdateStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UpdateSink { tx }, UnboundedReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_graph_id_strips_task_suffix() {
        let update = Update::subgraph("is_situation_agent:1234-abcd", "agent", vec![]);
        assert!(update.is_subgraph());
        assert_eq!(update.graph_id(), Some("is_situation_agent"));
        assert_eq!(Update::node(SUPERVISOR, vec![]).graph_id(), None);
    }

    #[test]
    fn test_final_reply_only_from_top_level_supervisor() {
        let reply = Update::node(SUPERVISOR, vec![Message::assistant("Stay calm.")]);
        assert_eq!(reply.final_reply(), Some("Stay calm."));

        let worker = Update::node("empathetic_agent", vec![Message::assistant("Stay calm.")]);
        assert_eq!(worker.final_reply(), None);

        let nested = Update::subgraph("empathetic_agent:1", SUPERVISOR, vec![Message::assistant("x")]);
        assert_eq!(nested.final_reply(), None);
    }

    #[tokio::test]
    async fn test_stream_preserves_order_and_ends() {
        let (sink, mut stream) = channel();
        sink.emit(Update::node("a", vec![]));
        sink.emit(Update::node("b", vec![]));
        drop(sink);

        assert_eq!(stream.next().await.unwrap().node, "a");
        assert_eq!(stream.next().await.unwrap().node, "b");
        assert!(stream.next().await.is_none());
    }
}
