//! # Cycle & Cycle Manager
//!
//! A [`Cycle`] is one ReAct loop iteration: a Thought, zero-or-more Actions,
//! and their paired Observations. [`CycleManager`] enforces the
//! `Idle -> CycleOpen -> Idle` state machine per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::action::{Action, Observation};
use crate::error::{Error, Result};
use crate::thought::Thought;

/// One ReAct loop iteration.
///
/// `actions`/`observations` are lists to allow a planner step that issues
/// several tool calls in parallel; `observations[i]` pairs with `actions[i]`.
/// The default engine restricts itself to at most one action per cycle, but
/// the list shape is kept for forward compatibility and JSON wire stability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub id: String,
    pub thought: Option<Thought>,
    pub actions: Vec<Action>,
    pub observations: Vec<Observation>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Cycle {
    fn new(thought: Thought) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thought: Some(thought),
            actions: Vec::new(),
            observations: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(thought: Thought) -> Self {
        Self::new(thought)
    }

    /// Convenience view: the first recorded action, if any.
    pub fn action(&self) -> Option<&Action> {
        self.actions.first()
    }

    /// Convenience view: the first recorded observation, if any.
    pub fn observation(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Well-formedness: every closed cycle has a Thought; any Action's
    /// `thought_id` matches this cycle's thought id; any Observation's
    /// `action_id` matches the paired action's id.
    pub fn is_well_formed(&self) -> bool {
        let Some(thought) = &self.thought else {
            return false;
        };
        if self.actions.iter().any(|a| a.thought_id != thought.id) {
            return false;
        }
        for (action, obs) in self.actions.iter().zip(self.observations.iter()) {
            if obs.action_id != action.id {
                return false;
            }
        }
        true
    }
}

struct SessionCycles {
    current: Option<Cycle>,
    history: Vec<Cycle>,
}

impl Default for SessionCycles {
    fn default() -> Self {
        Self {
            current: None,
            history: Vec::new(),
        }
    }
}

/// Per-session `Idle -> CycleOpen -> Idle` state machine over an append-only
/// cycle log. Concurrent-safe: writes are serialized with a per-session lock.
#[derive(Clone)]
pub struct CycleManager {
    sessions: Arc<Mutex<HashMap<String, SessionCycles>>>,
}

impl Default for CycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `Idle -> CycleOpen`. Fails with [`Error::CycleAlreadyOpen`] if a cycle
    /// is already open for `session_id`.
    pub async fn start_cycle(&self, session_id: &str, thought: Thought) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(session_id.to_string()).or_default();
        if entry.current.is_some() {
            return Err(Error::CycleAlreadyOpen);
        }
        entry.current = Some(Cycle::new(thought));
        Ok(())
    }

    /// Append an Action to the open cycle. Fails with [`Error::CycleNotOpen`]
    /// if no cycle is open.
    pub async fn record_action(&self, session_id: &str, action: Action) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(Error::CycleNotOpen)?;
        let cycle = entry.current.as_mut().ok_or(Error::CycleNotOpen)?;
        cycle.actions.push(action);
        Ok(())
    }

    /// Append an Observation to the open cycle. Fails with
    /// [`Error::CycleNotOpen`] if no cycle is open.
    pub async fn record_observation(&self, session_id: &str, observation: Observation) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(Error::CycleNotOpen)?;
        let cycle = entry.current.as_mut().ok_or(Error::CycleNotOpen)?;
        cycle.observations.push(observation);
        Ok(())
    }

    /// `CycleOpen -> Idle`: close the open cycle and return it.
    pub async fn end_cycle(&self, session_id: &str) -> Result<Cycle> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or(Error::CycleNotOpen)?;
        let mut cycle = entry.current.take().ok_or(Error::CycleNotOpen)?;
        cycle.end_time = Some(Utc::now());
        entry.history.push(cycle.clone());
        Ok(cycle)
    }

    /// Cycles in start-time order.
    pub async fn get_history(&self, session_id: &str) -> Vec<Cycle> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|e| e.history.clone())
            .unwrap_or_default()
    }

    /// The open cycle, if any.
    pub async fn current_cycle(&self, session_id: &str) -> Option<Cycle> {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).and_then(|e| e.current.clone())
    }

    /// Discard all cycle state for a session (used when a session is deleted).
    pub async fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(session_id);
    }
}
