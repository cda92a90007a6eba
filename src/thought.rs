//! # Thought Generator
//!
//! Builds a reasoning prompt from history and prior cycles, and turns a
//! model response into a [`Thought`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::model::{Model, ModelOptions};
use crate::tool::ToolDefinition;

/// Prompt sectioning requested of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThoughtFormat {
    /// Plain reasoning text.
    Free,
    /// Labeled Analysis/Plan/Reasoning sectioning.
    Structured,
}

/// A single reasoning step, optionally carrying structured tool calls the
/// model already committed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    pub content: String,
    pub format: ThoughtFormat,
    pub timestamp: DateTime<Utc>,
    /// Populated when the model returned structured tool calls directly,
    /// bypassing text parsing.
    pub suggested_actions: Vec<Action>,
    /// The action from the prior cycle, when this thought was generated in
    /// response to its observation.
    pub previous_action: Option<Action>,
}

impl Thought {
    pub fn new(content: impl Into<String>, format: ThoughtFormat) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            format,
            timestamp: Utc::now(),
            suggested_actions: Vec::new(),
            previous_action: None,
        }
    }

    pub fn with_suggested_actions(mut self, actions: Vec<Action>) -> Self {
        self.suggested_actions = actions;
        self
    }

    pub fn with_previous_action(mut self, action: Action) -> Self {
        self.previous_action = Some(action);
        self
    }

    /// Case-insensitive markers that signal the loop should stop.
    pub const FINAL_ANSWER_MARKERS: &'static [&'static str] = &[
        "final answer:",
        "my final answer is",
        "in conclusion,",
        "to summarize,",
        "i've completed my analysis",
        "the answer is",
    ];

    /// True if `content` contains one of the fixed final-answer phrases.
    pub fn contains_final_answer_marker(&self) -> bool {
        Self::find_final_answer_marker(&self.content).is_some()
    }

    /// Locate the first final-answer marker in `text`, case-insensitively,
    /// returning its byte offset in the lowercased text and the marker length.
    pub fn find_final_answer_marker(text: &str) -> Option<(usize, usize)> {
        let lower = text.to_lowercase();
        Self::FINAL_ANSWER_MARKERS
            .iter()
            .filter_map(|marker| lower.find(marker).map(|pos| (pos, marker.len())))
            .min_by_key(|(pos, _)| *pos)
    }

    /// Extract the final answer: the substring after the first marker,
    /// trimmed, or (absent a marker) the last paragraph.
    pub fn extract_final_answer(text: &str) -> String {
        if let Some((pos, len)) = Self::find_final_answer_marker(text) {
            let tail = &text[pos + len..];
            return tail.trim().to_string();
        }
        text.split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .next_back()
            .unwrap_or(text)
            .trim()
            .to_string()
    }
}

/// Builds a reasoning prompt and produces a [`Thought`].
#[async_trait]
pub trait ThoughtGenerator: Send + Sync {
    async fn generate(
        &self,
        user_message: &Message,
        prior_cycles: &[Cycle],
        tools: &[ToolDefinition],
        format: ThoughtFormat,
    ) -> Result<Thought>;
}

/// Default thought generator: renders tool descriptions, the user query, and
/// each prior cycle as `Thought/Tool/Input/Observation`, then asks the model
/// to continue reasoning or emit a final answer.
pub struct DefaultThoughtGenerator<M: Model> {
    model: std::sync::Arc<M>,
    /// Maximum number of prior cycles rendered into the prompt (the
    /// "configurable context window").
    pub context_window: usize,
}

impl<M: Model> DefaultThoughtGenerator<M> {
    pub fn new(model: std::sync::Arc<M>) -> Self {
        Self {
            model,
            context_window: 10,
        }
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    fn render_prompt(
        &self,
        user_message: &Message,
        prior_cycles: &[Cycle],
        tools: &[ToolDefinition],
        format: ThoughtFormat,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str("You are a ReAct agent. Available tools:\n");
        for tool in tools {
            prompt.push_str(&format!(
                "- {}: {} (parameters: {})\n",
                tool.name,
                tool.description,
                tool.to_json_schema()
            ));
        }
        prompt.push_str(&format!("\nUser query: {}\n\n", user_message.content));

        let window_start = prior_cycles.len().saturating_sub(self.context_window);
        let mut repeated_failures = std::collections::HashMap::new();
        for cycle in &prior_cycles[window_start..] {
            if let Some(thought) = &cycle.thought {
                prompt.push_str(&format!("Thought: {}\n", thought.content));
            }
            if let Some(action) = cycle.action() {
                prompt.push_str(&format!("Tool: {}\n", action.tool_name));
                prompt.push_str(&format!("Input: {}\n", action.input_json_string()));
            }
            if let Some(obs) = cycle.observation() {
                if obs.is_error {
                    let count = repeated_failures
                        .entry(cycle.action().map(|a| a.tool_name.clone()))
                        .and_modify(|c| *c += 1)
                        .or_insert(1);
                    prompt.push_str(&format!(
                        "Observation: error - {}{}\n",
                        obs.error_text().unwrap_or_default(),
                        if *count > 1 {
                            format!(" (repeated {count} times, try a different approach)")
                        } else {
                            String::new()
                        }
                    ));
                } else {
                    prompt.push_str(&format!(
                        "Observation: {}\n",
                        obs.output_text().unwrap_or_default()
                    ));
                }
            }
            prompt.push('\n');
        }

        match format {
            ThoughtFormat::Free => {
                prompt.push_str(
                    "Think through the next step. If you are done, begin your response with \"Final Answer:\".\n",
                );
            }
            ThoughtFormat::Structured => {
                prompt.push_str(
                    "Respond with labeled sections: Analysis:, Plan:, Reasoning:. If you are done, begin with \"Final Answer:\".\n",
                );
            }
        }
        prompt
    }
}

#[async_trait]
impl<M: Model> ThoughtGenerator for DefaultThoughtGenerator<M> {
    async fn generate(
        &self,
        user_message: &Message,
        prior_cycles: &[Cycle],
        tools: &[ToolDefinition],
        format: ThoughtFormat,
    ) -> Result<Thought> {
        let prompt = self.render_prompt(user_message, prior_cycles, tools, format);
        let opts = ModelOptions::default().with_tools(tools.to_vec());
        let response = self.model.generate(&prompt, &opts).await?;

        if response.text.trim().is_empty() && response.tool_calls.is_empty() {
            return Err(Error::EmptyModelOutput);
        }

        let thought_id = Uuid::new_v4().to_string();
        let suggested_actions = response
            .tool_calls
            .iter()
            .map(|tc| Action::from_tool_call(&thought_id, tc))
            .collect::<Result<Vec<_>>>()?;

        let content = if response.text.trim().is_empty() {
            // Streaming/tool-call-only responses: synthesize a minimal thought.
            suggested_actions
                .first()
                .map(|a| format!("I'll use the {} tool.", a.tool_name))
                .unwrap_or_default()
        } else {
            response.text
        };

        let mut thought = Thought::new(content, format).with_suggested_actions(suggested_actions);
        thought.id = thought_id;
        Ok(thought)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer_marker_detection() {
        let t = Thought::new("I know this. Final Answer: 4", ThoughtFormat::Free);
        assert!(t.contains_final_answer_marker());
    }

    #[test]
    fn test_final_answer_extraction() {
        let extracted = Thought::extract_final_answer("I know this. Final Answer: 4");
        assert_eq!(extracted, "4");
    }

    #[test]
    fn test_final_answer_extraction_without_marker_uses_last_paragraph() {
        let extracted = Thought::extract_final_answer("First paragraph.\n\nLast paragraph here.");
        assert_eq!(extracted, "Last paragraph here.");
    }

    #[test]
    fn test_case_insensitive_marker() {
        let t = Thought::new("IN CONCLUSION, it's 4", ThoughtFormat::Free);
        assert!(t.contains_final_answer_marker());
    }

    #[test]
    fn test_no_marker_present() {
        let t = Thought::new("I'm still thinking about this", ThoughtFormat::Free);
        assert!(!t.contains_final_answer_marker());
    }
}
