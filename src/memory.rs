//! # Message Memory
//!
//! An ordered, append-only message log. Appends are serialized; reads return
//! a snapshot so concurrent readers never observe a torn write.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::message::Message;

/// Ordered append-only message log.
#[async_trait]
pub trait Memory: Send + Sync {
    async fn store(&self, message: Message) -> Result<()>;

    /// The full ordered log.
    async fn retrieve(&self) -> Result<Vec<Message>>;

    /// The last `n` messages, in order. Convenience over `retrieve`.
    async fn retrieve_last(&self, n: usize) -> Result<Vec<Message>> {
        let all = self.retrieve().await?;
        let start = all.len().saturating_sub(n);
        Ok(all[start..].to_vec())
    }
}

/// An in-process `Memory` backed by a per-session `Vec<Message>`.
#[derive(Clone)]
pub struct InMemoryMemory {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl Default for InMemoryMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Memory for InMemoryMemory {
    async fn store(&self, message: Message) -> Result<()> {
        let mut messages = self.messages.lock().await;
        messages.push(message);
        Ok(())
    }

    async fn retrieve(&self) -> Result<Vec<Message>> {
        let messages = self.messages.lock().await;
        Ok(messages.clone())
    }
}

/// Multiple independent [`InMemoryMemory`] logs keyed by session id, used by
/// the session runner.
#[derive(Clone, Default)]
pub struct SessionMemories {
    sessions: Arc<Mutex<HashMap<String, InMemoryMemory>>>,
}

impl SessionMemories {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, session_id: &str) -> InMemoryMemory {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(InMemoryMemory::new)
            .clone()
    }

    pub async fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(session_id);
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        sessions.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;

    #[tokio::test]
    async fn test_store_and_retrieve_order() {
        let mem = InMemoryMemory::new();
        mem.store(Message::user("first")).await.unwrap();
        mem.store(Message::assistant_text("second")).await.unwrap();
        let all = mem.retrieve().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "first");
        assert_eq!(all[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_retrieve_last_bounded() {
        let mem = InMemoryMemory::new();
        for i in 0..5 {
            mem.store(Message::user(format!("msg {i}"))).await.unwrap();
        }
        let last = mem.retrieve_last(2).await.unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].content, "msg 3");
        assert_eq!(last[1].content, "msg 4");
    }

    #[tokio::test]
    async fn test_retrieve_last_more_than_available() {
        let mem = InMemoryMemory::new();
        mem.store(Message::user("only one")).await.unwrap();
        let last = mem.retrieve_last(10).await.unwrap();
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn test_session_memories_independent() {
        let sessions = SessionMemories::new();
        let a = sessions.get_or_create("a").await;
        let b = sessions.get_or_create("b").await;
        a.store(Message::user("hi a")).await.unwrap();
        b.store(Message::user("hi b")).await.unwrap();
        assert_eq!(a.retrieve().await.unwrap().len(), 1);
        assert_eq!(b.retrieve().await.unwrap().len(), 1);
    }
}
