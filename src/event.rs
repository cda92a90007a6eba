//! # Event Model
//!
//! Typed events flowing over the streaming channel a [`crate::engine::ReActAgent::run_async`]
//! or composite agent returns. Each event is the full unit of observation —
//! consumers never reconstruct state from partial events — and ordering on a
//! single channel reflects production order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::message::Message;

/// Discriminated event payload. Matches the wire taxonomy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    Thinking { content: String },
    Tool { tool_name: String, input: String },
    Observation { content: String },
    StreamChunk { content: String, sequence: u64 },
    StreamEnd { complete_text: String },
    Message { message: Message },
    Error { error: String, error_code: i32 },
    AgentStart { agent: String, index: usize },
    AgentEnd { agent: String, index: usize },
    Custom { kind: String, data: serde_json::Value },
}

/// A single event on the streaming channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub data: EventData,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(data: EventData) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            data,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn thinking(content: impl Into<String>) -> Self {
        Self::new(EventData::Thinking {
            content: content.into(),
        })
    }

    pub fn tool(tool_name: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(EventData::Tool {
            tool_name: tool_name.into(),
            input: input.into(),
        })
    }

    pub fn observation(content: impl Into<String>) -> Self {
        Self::new(EventData::Observation {
            content: content.into(),
        })
    }

    pub fn message(message: Message) -> Self {
        Self::new(EventData::Message { message })
    }

    pub fn error(error: impl Into<String>, error_code: i32) -> Self {
        Self::new(EventData::Error {
            error: error.into(),
            error_code,
        })
    }

    pub fn agent_start(agent: impl Into<String>, index: usize) -> Self {
        Self::new(EventData::AgentStart {
            agent: agent.into(),
            index,
        })
    }

    pub fn agent_end(agent: impl Into<String>, index: usize) -> Self {
        Self::new(EventData::AgentEnd {
            agent: agent.into(),
            index,
        })
    }

    /// True once this event closes a channel: the contract guarantees at most
    /// one of `Message` or `Error` is the final event.
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, EventData::Message { .. } | EventData::Error { .. })
    }
}

/// Default buffered capacity for a `RunAsync` event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 10;

/// Sender half of an event channel, as handed to an engine's background task.
pub type EventSender = tokio::sync::mpsc::Sender<Event>;

/// Receiver half of an event channel, as handed back to the caller of `RunAsync`.
pub type EventReceiver = tokio::sync::mpsc::Receiver<Event>;

/// Create a new bounded event channel with the default capacity.
pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(Event::message(Message::user("hi")).is_terminal());
        assert!(Event::error("boom", 500).is_terminal());
        assert!(!Event::thinking("...").is_terminal());
    }

    #[test]
    fn test_metadata_roundtrip() {
        let ev = Event::tool("search", "{}").with_metadata("agent", "A");
        assert_eq!(ev.metadata.get("agent"), Some(&"A".to_string()));
    }

    #[tokio::test]
    async fn test_event_channel_preserves_order() {
        let (tx, mut rx) = event_channel();
        tx.send(Event::thinking("one")).await.unwrap();
        tx.send(Event::thinking("two")).await.unwrap();
        drop(tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first.data, second.data) {
            (EventData::Thinking { content: a }, EventData::Thinking { content: b }) => {
                assert_eq!(a, "one");
                assert_eq!(b, "two");
            }
            _ => panic!("unexpected event variants"),
        }
        assert!(rx.recv().await.is_none());
    }
}
