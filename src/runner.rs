//! # Session Runner
//!
//! Wraps any [`Agent`] with session bookkeeping: creation, lookup, listing,
//! and TTL-based lazy eviction. Eviction is lazy rather than a background
//! sweep: a session past its TTL is dropped the next time it's looked up,
//! listed, or run against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::{Agent, ReActAgent};
use crate::error::{Error, Result};
use crate::event::{event_channel, Event, EventReceiver};
use crate::message::Message;
use crate::session::{SessionInfo, SessionLog};

/// Default session idle TTL: one hour.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

fn is_expired(info: &SessionInfo, ttl: Duration) -> bool {
    info.age_since_active().to_std().map(|a| a >= ttl).unwrap_or(false)
}

/// Session-scoped wrapper over a single [`Agent`].
///
/// `A` is any agent — a bare [`crate::engine::ReActAgent`] or a composite
/// from [`crate::composite`] — addressed uniformly through the [`Agent`]
/// trait.
pub struct Runner<A: Agent> {
    agent: Arc<A>,
    sessions: Mutex<HashMap<String, SessionInfo>>,
    ttl: Duration,
}

impl<A: Agent> Runner<A> {
    pub fn new(agent: Arc<A>) -> Self {
        Self {
            agent,
            sessions: Mutex::new(HashMap::new()),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn agent(&self) -> &Arc<A> {
        &self.agent
    }

    /// Drop any session whose TTL has elapsed since its last activity.
    async fn evict_expired(&self, sessions: &mut HashMap<String, SessionInfo>) {
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, info)| is_expired(info, self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            sessions.remove(&id);
            self.agent.clear_session(&id).await;
        }
    }

    /// Create a new session with a fresh id.
    pub async fn create_session(&self) -> SessionInfo {
        self.create_session_with_id(Uuid::new_v4().to_string()).await
    }

    /// Create a new session with a caller-chosen id. Fails if the id is
    /// already in use.
    pub async fn create_session_with_id(&self, id: impl Into<String>) -> SessionInfo {
        let id = id.into();
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions).await;
        let info = SessionInfo::new(id.clone());
        sessions.insert(id, info.clone());
        info
    }

    /// Look up a session, evicting it first if its TTL has elapsed.
    pub async fn get_session(&self, id: &str) -> Option<SessionInfo> {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions).await;
        sessions.get(id).cloned()
    }

    /// All live (non-expired) sessions.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions).await;
        sessions.values().cloned().collect()
    }

    /// Remove a session and discard the agent's state for it.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(id).is_none() {
            return Err(Error::invalid_input(format!("no such session: {id}")));
        }
        drop(sessions);
        self.agent.clear_session(id).await;
        Ok(())
    }

    async fn touch(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions).await;
        let info = sessions
            .get_mut(id)
            .ok_or_else(|| Error::invalid_input(format!("no such session: {id}")))?;
        info.touch();
        Ok(())
    }

    /// Run the wrapped agent against an existing session.
    pub async fn run(&self, session_id: &str, user_message: Message) -> Result<Message> {
        self.touch(session_id).await?;
        self.agent.run(session_id, user_message).await
    }

    /// Run the wrapped agent, streaming `AgentStart`/terminal events over a
    /// fresh channel. Agents that natively stream intra-run events (such as
    /// [`crate::engine::ReActAgent`]) should be driven directly via their
    /// own `run_async` for full fidelity; this wrapper gives any `Agent` a
    /// uniform start/terminal event shape.
    pub async fn run_async(
        self: &Arc<Self>,
        session_id: impl Into<String>,
        user_message: Message,
    ) -> Result<EventReceiver> {
        let session_id = session_id.into();
        self.touch(&session_id).await?;
        let (tx, rx) = event_channel();
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let _ = tx.send(Event::agent_start(runner.agent.name().to_string(), 0)).await;
            let result = runner.agent.run(&session_id, user_message).await;
            match result {
                Ok(message) => {
                    let _ = tx.send(Event::message(message)).await;
                }
                Err(e) => {
                    let _ = tx.send(Event::error(e.to_string(), 500)).await;
                }
            }
        });
        Ok(rx)
    }
}

impl Runner<ReActAgent> {
    /// A snapshot of a `ReActAgent` session's full cycle and message history.
    pub async fn session_log(&self, session_id: &str) -> Result<SessionLog> {
        let cycles = self.agent.history(session_id).await;
        let messages = self.agent.messages(session_id).await?;
        Ok(SessionLog::new(session_id, cycles, messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        fn name(&self) -> &str {
            "echo"
        }

        async fn run(&self, _session_id: &str, user_message: Message) -> Result<Message> {
            Ok(Message::assistant_text(user_message.content))
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let runner = Runner::new(Arc::new(EchoAgent));
        let info = runner.create_session().await;
        assert!(runner.get_session(&info.id).await.is_some());
    }

    #[tokio::test]
    async fn test_run_requires_existing_session() {
        let runner = Runner::new(Arc::new(EchoAgent));
        let err = runner.run("missing", Message::user("hi")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_run_against_created_session() {
        let runner = Runner::new(Arc::new(EchoAgent));
        let info = runner.create_session().await;
        let reply = runner.run(&info.id, Message::user("hello")).await.unwrap();
        assert_eq!(reply.content, "hello");
    }

    #[tokio::test]
    async fn test_delete_session_removes_it() {
        let runner = Runner::new(Arc::new(EchoAgent));
        let info = runner.create_session().await;
        runner.delete_session(&info.id).await.unwrap();
        assert!(runner.get_session(&info.id).await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry_evicts_session() {
        let runner = Runner::new(Arc::new(EchoAgent)).with_ttl(Duration::from_millis(1));
        let info = runner.create_session().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(runner.get_session(&info.id).await.is_none());
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let runner = Runner::new(Arc::new(EchoAgent));
        runner.create_session().await;
        runner.create_session().await;
        assert_eq!(runner.list_sessions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_run_async_emits_terminal_message() {
        let runner = Arc::new(Runner::new(Arc::new(EchoAgent)));
        let info = runner.create_session().await;
        let mut rx = runner.run_async(info.id, Message::user("hi")).await.unwrap();
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(last.unwrap().is_terminal());
    }
}
