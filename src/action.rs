//! # Action Selector / Parser
//!
//! Converts a [`Thought`] into one or more validated [`Action`]s, and records
//! the resulting [`Observation`] once a tool resolves. Implements a
//! five-step resolution order: suggested actions, a dedicated
//! model invocation, structured tool calls in that response, a JSON object
//! recovered from free text, and finally the ReAct `Action:`/`Action Input:`
//! textual format.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Model, ModelOptions, ToolCall};
use crate::thought::Thought;
use crate::tool::{self, ToolSet};

/// A validated tool invocation produced from a [`Thought`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub thought_id: String,
    pub tool_name: String,
    pub tool_input: serde_json::Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Action {
    pub fn new(
        thought_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_input: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thought_id: thought_id.into(),
            tool_name: tool_name.into(),
            tool_input,
            timestamp: Utc::now(),
        }
    }

    /// Parse a model's structured tool call into an (uncoerced) Action.
    /// `function.arguments` arrives as a JSON-encoded string.
    pub fn from_tool_call(thought_id: &str, call: &ToolCall) -> Result<Self> {
        let input: Value = serde_json::from_str(&call.arguments)
            .map_err(|e| Error::ArgumentParse(format!("{}: {e}", call.name)))?;
        let map = match input {
            Value::Object(m) => m,
            _ => return Err(Error::ArgumentParse(format!("{}: arguments must be a JSON object", call.name))),
        };
        Ok(Action::new(thought_id.to_string(), call.name.clone(), map))
    }

    pub fn input_as_map(&self) -> HashMap<String, Value> {
        self.tool_input.clone().into_iter().collect()
    }

    pub fn input_json_string(&self) -> String {
        serde_json::to_string(&self.tool_input).unwrap_or_default()
    }
}

/// Hint to downstream renderers about the shape of `tool_output`. The engine
/// itself relies only on `is_error` and the `output`/`error` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Text,
    Json,
    Error,
}

/// Exactly one of `output`/`error` is meaningful, selected by `is_error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutputMap {
    pub output: Option<Value>,
    pub error: Option<String>,
}

/// The result of resolving and executing an [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub action_id: String,
    pub tool_output: ToolOutputMap,
    pub is_error: bool,
    pub kind: ObservationKind,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn success(action_id: impl Into<String>, output: Value) -> Self {
        let kind = match &output {
            Value::Object(_) | Value::Array(_) => ObservationKind::Json,
            _ => ObservationKind::Text,
        };
        Self {
            id: Uuid::new_v4().to_string(),
            action_id: action_id.into(),
            tool_output: ToolOutputMap {
                output: Some(output),
                error: None,
            },
            is_error: false,
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn error(action_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_id: action_id.into(),
            tool_output: ToolOutputMap {
                output: None,
                error: Some(message.into()),
            },
            is_error: true,
            kind: ObservationKind::Error,
            timestamp: Utc::now(),
        }
    }

    pub fn output_text(&self) -> Option<String> {
        self.tool_output.output.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn error_text(&self) -> Option<String> {
        self.tool_output.error.clone()
    }
}

/// Converts a Thought into one or more validated Actions.
#[async_trait]
pub trait ActionSelector: Send + Sync {
    async fn select(&self, thought: &Thought, tools: &ToolSet) -> Result<Vec<Action>>;
}

/// The default five-step resolution chain.
pub struct DefaultActionSelector {
    model: Option<Arc<dyn Model>>,
}

impl DefaultActionSelector {
    /// A selector with no model fallback: only suggested actions and text
    /// parsing (steps 1, 4, 5) are available.
    pub fn new() -> Self {
        Self { model: None }
    }

    /// A selector that, absent suggested actions, asks `model` to choose a
    /// tool directly (steps 2-3) before falling back to text parsing.
    pub fn with_model(model: Arc<dyn Model>) -> Self {
        Self { model: Some(model) }
    }

    fn validate_and_coerce(&self, actions: Vec<Action>, tools: &ToolSet) -> Result<Vec<Action>> {
        actions
            .into_iter()
            .map(|mut action| {
                let tool = tools
                    .get(&action.tool_name)
                    .ok_or_else(|| Error::UnknownTool(action.tool_name.clone()))?;
                let def = tool.get_definition();
                let coerced = tool::coerce_arguments(&def, action.input_as_map())?;
                action.tool_input = coerced.into_iter().collect();
                Ok(action)
            })
            .collect()
    }
}

impl Default for DefaultActionSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionSelector for DefaultActionSelector {
    async fn select(&self, thought: &Thought, tools: &ToolSet) -> Result<Vec<Action>> {
        // Step 1: suggested actions already on the Thought.
        if !thought.suggested_actions.is_empty() {
            return self.validate_and_coerce(thought.suggested_actions.clone(), tools);
        }

        // Steps 2-3: ask the model to pick a tool directly.
        if let Some(model) = &self.model {
            if model.supports_tool_calls() {
                let defs = tools.definitions();
                let opts = ModelOptions::default().with_tools(defs);
                let prompt = format!(
                    "Given this reasoning, select exactly one tool call to execute next:\n{}",
                    thought.content
                );
                if let Ok(response) = model.generate(&prompt, &opts).await {
                    if !response.tool_calls.is_empty() {
                        let actions = response
                            .tool_calls
                            .iter()
                            .map(|tc| Action::from_tool_call(&thought.id, tc))
                            .collect::<Result<Vec<_>>>()?;
                        return self.validate_and_coerce(actions, tools);
                    }
                }
            }
        }

        // Step 4: a JSON object recovered from free text.
        if let Some(action) = parse_json_action(&thought.id, &thought.content, tools) {
            return self.validate_and_coerce(vec![action], tools);
        }

        // Step 5: the ReAct textual format.
        if let Some(action) = parse_react_text(&thought.id, &thought.content, tools) {
            return self.validate_and_coerce(vec![action], tools);
        }

        Err(Error::NoActionFound)
    }
}

fn value_to_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(m) => m,
        _ => serde_json::Map::new(),
    }
}

/// Locate the first fenced ```json``` block, else the first balanced
/// `{...}` object, in `text`.
fn find_balanced_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let after = &text[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim());
        }
    }

    let mut depth = 0i32;
    let mut start_idx: Option<usize> = None;
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start_idx = Some(i);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start_idx {
                        return Some(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Step 4: `{tool_name, tool_input}`, `{name, arguments}`, or a direct
/// parameter object when a tool name is identified by substring match.
fn parse_json_action(thought_id: &str, text: &str, tools: &ToolSet) -> Option<Action> {
    let json_str = find_balanced_json(text)?;
    let value: Value = serde_json::from_str(json_str).ok()?;
    let obj = value.as_object()?;

    if let Some(name) = obj.get("tool_name").and_then(Value::as_str) {
        let input = obj.get("tool_input").cloned().unwrap_or(Value::Object(Default::default()));
        return Some(Action::new(thought_id, name, value_to_map(input)));
    }

    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        let args = obj.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));
        let map = match args {
            Value::String(s) => serde_json::from_str(&s).ok()?,
            Value::Object(m) => m,
            _ => return None,
        };
        return Some(Action::new(thought_id, name, map));
    }

    for tool_name in tools.names() {
        if text.contains(&tool_name) {
            return Some(Action::new(thought_id, tool_name, value_to_map(value)));
        }
    }
    None
}

/// Step 5: `Action: <name>` followed optionally by `Action Input: <k=v, ...>`
/// or free text.
fn parse_react_text(thought_id: &str, text: &str, tools: &ToolSet) -> Option<Action> {
    let lines: Vec<&str> = text.lines().collect();
    let action_idx = lines
        .iter()
        .position(|l| l.trim_start().starts_with("Action:"))?;
    let name = lines[action_idx]
        .trim_start()
        .trim_start_matches("Action:")
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    let mut input_line = None;
    for line in &lines[action_idx + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("Action Input:") {
            input_line = Some(rest.trim().to_string());
        }
        break;
    }

    let tool_input = match input_line {
        Some(raw) if !raw.is_empty() => parse_action_input(&raw, &name, tools),
        _ => serde_json::Map::new(),
    };

    Some(Action::new(thought_id, name, tool_input))
}

fn parse_action_input(raw: &str, tool_name: &str, tools: &ToolSet) -> serde_json::Map<String, Value> {
    if looks_like_key_value(raw) {
        let mut map = serde_json::Map::new();
        for pair in split_quote_aware(raw, ',') {
            if let Some((k, v)) = pair.split_once('=') {
                let key = k.trim().to_string();
                let value = unquote(v.trim());
                map.insert(key, coerce_bare_value(&value));
            }
        }
        map
    } else {
        let key = tools
            .get(tool_name)
            .map(|t| t.get_definition().primary_parameter())
            .unwrap_or_else(|| "input".to_string());
        let mut map = serde_json::Map::new();
        map.insert(key, Value::String(unquote(raw.trim())));
        map
    }
}

fn looks_like_key_value(raw: &str) -> bool {
    split_quote_aware(raw, ',')
        .iter()
        .all(|part| part.contains('='))
        && raw.contains('=')
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn coerce_bare_value(val: &str) -> Value {
    match val {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = val.parse::<i64>() {
        return serde_json::json!(i);
    }
    if let Ok(f) = val.parse::<f64>() {
        return serde_json::json!(f);
    }
    if (val.starts_with('{') && val.ends_with('}')) || (val.starts_with('[') && val.ends_with(']')) {
        if let Ok(v) = serde_json::from_str(val) {
            return v;
        }
    }
    Value::String(val.to_string())
}

/// Quote-aware split on `delim`: occurrences inside single/double quotes are
/// not treated as separators.
fn split_quote_aware(s: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';
    for c in s.chars() {
        if in_quotes {
            current.push(c);
            if c == quote_char {
                in_quotes = false;
            }
        } else if c == '"' || c == '\'' {
            in_quotes = true;
            quote_char = c;
            current.push(c);
        } else if c == delim {
            parts.push(std::mem::take(&mut current).trim().to_string());
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}
