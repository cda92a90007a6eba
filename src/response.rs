//! # Response Generator
//!
//! Produces the final user-facing message from a cycle history: either
//! direct extraction from the last cycle's thought, or a model-mediated
//! conversational summary.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::model::{Model, ModelOptions};
use crate::thought::Thought;

/// The canned message returned when no cycle produced any observation at all.
pub const CANNED_APOLOGY: &str =
    "I wasn't able to process your request effectively. Could you provide more details?";

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, user_message: &Message, cycles: &[Cycle]) -> Result<Message>;
}

/// Returns the final cycle's thought content, stripped to the text after its
/// final-answer marker if present.
pub struct DirectResponseGenerator;

#[async_trait]
impl ResponseGenerator for DirectResponseGenerator {
    async fn generate(&self, _user_message: &Message, cycles: &[Cycle]) -> Result<Message> {
        let Some(last) = cycles.last() else {
            return Ok(Message::assistant_text(CANNED_APOLOGY));
        };
        let Some(thought) = &last.thought else {
            return Ok(Message::assistant_text(CANNED_APOLOGY));
        };
        let content = Thought::extract_final_answer(&thought.content);
        if content.trim().is_empty() {
            return Err(Error::EmptyModelOutput);
        }
        Ok(Message::assistant_text(content))
    }
}

/// Builds a summarization prompt containing the user query and either the
/// full reasoning trace or just the final thought, and asks the configured
/// model for a conversational reply. Tool calls are disabled for this call.
pub struct ModelMediatedResponseGenerator<M: Model> {
    model: Arc<M>,
    include_full_trace: bool,
}

impl<M: Model> ModelMediatedResponseGenerator<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            include_full_trace: true,
        }
    }

    pub fn with_full_trace(mut self, include: bool) -> Self {
        self.include_full_trace = include;
        self
    }

    fn render_trace(&self, cycles: &[Cycle]) -> String {
        if !self.include_full_trace {
            return cycles
                .last()
                .and_then(|c| c.thought.as_ref())
                .map(|t| t.content.clone())
                .unwrap_or_default();
        }
        let mut trace = String::new();
        for cycle in cycles {
            if let Some(thought) = &cycle.thought {
                trace.push_str(&format!("Thought: {}\n", thought.content));
            }
            if let Some(action) = cycle.action() {
                trace.push_str(&format!("Tool: {}\n", action.tool_name));
            }
            if let Some(obs) = cycle.observation() {
                let text = if obs.is_error {
                    obs.error_text().unwrap_or_default()
                } else {
                    obs.output_text().unwrap_or_default()
                };
                trace.push_str(&format!("Observation: {text}\n"));
            }
        }
        trace
    }
}

#[async_trait]
impl<M: Model> ResponseGenerator for ModelMediatedResponseGenerator<M> {
    async fn generate(&self, user_message: &Message, cycles: &[Cycle]) -> Result<Message> {
        if cycles.is_empty() {
            return Ok(Message::assistant_text(CANNED_APOLOGY));
        }
        let trace = self.render_trace(cycles);
        let prompt = format!(
            "The user asked: {}\n\nHere is the reasoning trace:\n{trace}\n\nWrite a clear, conversational final answer.",
            user_message.content
        );
        let opts = ModelOptions {
            enable_tool_calls: false,
            ..ModelOptions::default()
        };
        let response = self.model.generate(&prompt, &opts).await?;
        if response.text.trim().is_empty() {
            return Err(Error::EmptyModelOutput);
        }
        Ok(Message::assistant_text(response.text))
    }
}
