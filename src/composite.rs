//! # Composite Agents
//!
//! [`ParallelAgent`] fans a message out to several agents and joins their
//! replies; [`SequentialAgent`] pipes one agent's reply into the next.
//! Both implement [`Agent`] themselves, so composites can nest.

use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::Agent;
use crate::error::{Error, Result};
use crate::event::{Event, EventSender};
use crate::message::Message;

/// How a composite reacts to a child agent failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort the whole composite run with the first error encountered.
    AbortOnError,
    /// Record the failure as a joined/passed-through error message and
    /// keep going with the remaining children.
    ContinueOnError,
}

/// Runs every child agent against the same input and joins their replies.
///
/// Each child's failure is isolated: under [`ErrorPolicy::ContinueOnError`]
/// one child erroring does not prevent the others' replies from being joined.
pub struct ParallelAgent {
    name: String,
    children: Vec<Arc<dyn Agent>>,
    error_policy: ErrorPolicy,
}

impl ParallelAgent {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            children,
            error_policy: ErrorPolicy::ContinueOnError,
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Join format: `Agent [<name>]: <text>`, one child per line, in child
    /// registration order regardless of completion order.
    fn join(results: &[(String, Result<Message>)]) -> String {
        results
            .iter()
            .map(|(name, result)| match result {
                Ok(message) => format!("Agent [{name}]: {}", message.content),
                Err(e) => format!("Agent [{name}]: error - {e}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run with events from each child agent forwarded to `emit`, tagged
    /// with `AgentStart`/`AgentEnd` markers by child index.
    pub async fn run_async(
        &self,
        session_id: &str,
        user_message: Message,
        emit: &EventSender,
    ) -> Result<Message> {
        let handles: Vec<_> = self
            .children
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, child)| {
                let session_id = format!("{session_id}:{index}");
                let user_message = user_message.clone();
                tokio::spawn(async move {
                    let result = child.run(&session_id, user_message).await;
                    (child.name().to_string(), result)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let _ = emit.send(Event::agent_start(self.name.clone(), index)).await;
            let (name, result) = handle
                .await
                .map_err(|e| Error::other(format!("agent task panicked: {e}")))?;
            if let Err(e) = &result {
                if self.error_policy == ErrorPolicy::AbortOnError {
                    return Err(Error::other(format!("agent '{name}' failed: {e}")));
                }
            }
            let _ = emit.send(Event::agent_end(self.name.clone(), index)).await;
            results.push((name, result));
        }

        Ok(Message::assistant_text(Self::join(&results)))
    }
}

#[async_trait]
impl Agent for ParallelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, session_id: &str, user_message: Message) -> Result<Message> {
        let handles: Vec<_> = self
            .children
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, child)| {
                let session_id = format!("{session_id}:{index}");
                let user_message = user_message.clone();
                tokio::spawn(async move {
                    let result = child.run(&session_id, user_message).await;
                    (child.name().to_string(), result)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let (name, result) = handle
                .await
                .map_err(|e| Error::other(format!("agent task panicked: {e}")))?;
            if let Err(e) = &result {
                if self.error_policy == ErrorPolicy::AbortOnError {
                    return Err(Error::other(format!("agent '{name}' failed: {e}")));
                }
            }
            results.push((name, result));
        }

        Ok(Message::assistant_text(Self::join(&results)))
    }

    async fn clear_session(&self, session_id: &str) {
        for (index, child) in self.children.iter().enumerate() {
            child.clear_session(&format!("{session_id}:{index}")).await;
        }
    }
}

/// A pre- or post-processing step run between pipeline stages.
pub type PipelineHook = Arc<dyn Fn(Message) -> Message + Send + Sync>;

/// Runs child agents one after another, piping each reply into the next
/// agent's input message. Optionally accumulates per-child metadata on the
/// final message.
pub struct SequentialAgent {
    name: String,
    children: Vec<Arc<dyn Agent>>,
    error_policy: ErrorPolicy,
    pre_process: Option<PipelineHook>,
    post_process: Option<PipelineHook>,
    accumulate_metadata: bool,
}

impl SequentialAgent {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            children,
            error_policy: ErrorPolicy::AbortOnError,
            pre_process: None,
            post_process: None,
            accumulate_metadata: false,
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_pre_process(mut self, hook: PipelineHook) -> Self {
        self.pre_process = Some(hook);
        self
    }

    pub fn with_post_process(mut self, hook: PipelineHook) -> Self {
        self.post_process = Some(hook);
        self
    }

    pub fn with_metadata_accumulation(mut self, accumulate: bool) -> Self {
        self.accumulate_metadata = accumulate;
        self
    }
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, session_id: &str, user_message: Message) -> Result<Message> {
        let mut current = user_message;
        let mut metadata = std::collections::HashMap::new();

        for child in &self.children {
            if let Some(hook) = &self.pre_process {
                current = hook(current);
            }

            let result = child.run(session_id, current.clone()).await;
            let mut reply = match result {
                Ok(reply) => reply,
                Err(e) if self.error_policy == ErrorPolicy::ContinueOnError => {
                    Message::assistant_text(format!("agent '{}' failed: {e}", child.name()))
                }
                Err(e) => return Err(e),
            };

            if let Some(hook) = &self.post_process {
                reply = hook(reply);
            }

            if self.accumulate_metadata {
                metadata.insert(format!("agent:{}", child.name()), reply.content.clone());
            }

            current = reply;
        }

        if self.accumulate_metadata {
            for (key, value) in metadata {
                current = current.with_metadata(key, value);
            }
        }

        Ok(current)
    }

    async fn clear_session(&self, session_id: &str) {
        for child in &self.children {
            child.clear_session(session_id).await;
        }
    }
}
