//! # Session Log Types
//!
//! Read-only views over a session's accumulated state, assembled from the
//! [`crate::cycle::CycleManager`] and [`crate::memory::Memory`] a
//! [`crate::engine::ReActAgent`] already keeps per session.

use chrono::{DateTime, Utc};

use crate::cycle::Cycle;
use crate::message::Message;

/// Metadata about a runner-managed session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl SessionInfo {
    pub(crate) fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub(crate) fn age_since_active(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.last_active_at)
    }
}

/// A point-in-time snapshot of one session's full history: the closed
/// ReAct cycles and the conversational messages stored alongside them.
#[derive(Debug, Clone)]
pub struct SessionLog {
    pub session_id: String,
    pub cycles: Vec<Cycle>,
    pub messages: Vec<Message>,
}

impl SessionLog {
    pub fn new(session_id: impl Into<String>, cycles: Vec<Cycle>, messages: Vec<Message>) -> Self {
        Self {
            session_id: session_id.into(),
            cycles,
            messages,
        }
    }

    /// Total tool invocations across every cycle in this log.
    pub fn action_count(&self) -> usize {
        self.cycles.iter().map(|c| c.actions.len()).sum()
    }

    /// True if any recorded observation in this log was an error.
    pub fn had_errors(&self) -> bool {
        self.cycles
            .iter()
            .flat_map(|c| c.observations.iter())
            .any(|o| o.is_error)
    }
}
