//! # Model Abstraction
//!
//! A uniform contract for LLM back ends, in two capability tiers, plus one
//! concrete implementation (an OpenAI-compatible HTTP/SSE client) used by
//! tests and demos. Concrete back ends are external collaborators: the engine
//! only ever depends on the [`Model`]/[`StreamingModel`] traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::tool::ToolDefinition;

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Error,
}

/// A structured tool call returned by a tool-call-capable model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments, as the wire format specifies.
    pub arguments: String,
}

/// A generation result, whether from `generate*` or a single streamed chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            messages: Vec::new(),
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

/// Options accepted by `generate*` calls. Unknown options are ignored by
/// models that don't support them; the core never assumes a specific provider.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub enable_tool_calls: bool,
    pub tools: Vec<ToolDefinition>,
    pub stream: bool,
    pub timeout: Option<Duration>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: None,
            enable_tool_calls: false,
            tools: Vec::new(),
            stream: false,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl ModelOptions {
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.enable_tool_calls = !tools.is_empty();
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Base generation contract every back end must implement.
#[async_trait]
pub trait Model: Send + Sync {
    /// Single-turn generation from a plain prompt string.
    async fn generate(&self, prompt: &str, opts: &ModelOptions) -> Result<ModelResponse>;

    /// Multi-turn generation from a rendered message history.
    async fn generate_with_messages(
        &self,
        messages: &[Message],
        opts: &ModelOptions,
    ) -> Result<ModelResponse>;

    /// Whether this back end can return structured tool calls when
    /// `opts.enable_tool_calls` is set.
    fn supports_tool_calls(&self) -> bool {
        false
    }
}

/// A stream of generation chunks; the final chunk carries a `finish_reason`.
pub type ModelStream = BoxStream<'static, Result<ModelResponse>>;

/// Streaming capability tier.
#[async_trait]
pub trait StreamingModel: Model {
    async fn generate_stream_with_messages(
        &self,
        messages: &[Message],
        opts: &ModelOptions,
    ) -> Result<ModelStream>;
}

// ============================================================================
// Concrete reference back end: OpenAI-compatible HTTP/SSE client
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn role_str(role: crate::message::MessageRole) -> &'static str {
    use crate::message::MessageRole::*;
    match role {
        User => "user",
        Assistant => "assistant",
        System => "system",
        Tool => "tool",
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    delta: Option<ChatResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    id: String,
    function: RawFunctionCall,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

fn parse_finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    match raw {
        Some("stop") => Some(FinishReason::Stop),
        Some("length") => Some(FinishReason::Length),
        Some("tool_calls") => Some(FinishReason::ToolCalls),
        Some(_) => Some(FinishReason::Error),
        None => None,
    }
}

fn choice_to_response(choice: &ChatChoice) -> ModelResponse {
    let msg = choice.message.as_ref().or(choice.delta.as_ref());
    let text = msg.and_then(|m| m.content.clone()).unwrap_or_default();
    let tool_calls = msg
        .map(|m| {
            m.tool_calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    arguments: tc.function.arguments.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    ModelResponse {
        text,
        messages: Vec::new(),
        tool_calls,
        finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
    }
}

/// A Model/StreamingModel backend targeting any OpenAI-compatible chat
/// completions endpoint (LM Studio, Ollama, llama.cpp, vLLM).
pub struct OpenAiCompatibleModel {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    retry_config: crate::retry::RetryConfig,
}

impl OpenAiCompatibleModel {
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model_name: model_name.into(),
            retry_config: crate::retry::RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, config: crate::retry::RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        opts: &'a ModelOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model_name,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: role_str(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
            stream,
            tools: if opts.enable_tool_calls && !opts.tools.is_empty() {
                Some(
                    opts.tools
                        .iter()
                        .map(|t| {
                            serde_json::json!({
                                "type": "function",
                                "function": {
                                    "name": t.name,
                                    "description": t.description,
                                    "parameters": t.to_json_schema(),
                                }
                            })
                        })
                        .collect(),
                )
            } else {
                None
            },
        }
    }

    async fn post_chat(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self.client.post(url).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::api(format!("{status}: {text}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Model for OpenAiCompatibleModel {
    async fn generate(&self, prompt: &str, opts: &ModelOptions) -> Result<ModelResponse> {
        let messages = [Message::user(prompt)];
        self.generate_with_messages(&messages, opts).await
    }

    async fn generate_with_messages(
        &self,
        messages: &[Message],
        opts: &ModelOptions,
    ) -> Result<ModelResponse> {
        let body = self.build_request(messages, opts, false);
        let response = crate::retry::retry(self.retry_config, crate::retry::default_should_retry, || async {
            self.post_chat(&body).await
        })
        .await?;

        let completion: ChatCompletion = response.json().await?;
        let choice = completion
            .choices
            .first()
            .ok_or_else(|| Error::api("no choices in response"))?;
        Ok(choice_to_response(choice))
    }

    fn supports_tool_calls(&self) -> bool {
        true
    }
}

#[async_trait]
impl StreamingModel for OpenAiCompatibleModel {
    async fn generate_stream_with_messages(
        &self,
        messages: &[Message],
        opts: &ModelOptions,
    ) -> Result<ModelStream> {
        use eventsource_stream::Eventsource;
        use futures::StreamExt;

        let body = self.build_request(messages, opts, true);
        let response = self.post_chat(&body).await?;
        let mut source = response.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            while let Some(event) = source.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(Error::stream(e.to_string()));
                        return;
                    }
                };
                if event.data == "[DONE]" {
                    log::debug!("stream terminated by [DONE] sentinel");
                    return;
                }
                let completion: ChatCompletion = match serde_json::from_str(&event.data) {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Error::stream(format!("malformed SSE chunk: {e}")));
                        continue;
                    }
                };
                let Some(choice) = completion.choices.first() else { continue };
                yield Ok(choice_to_response(choice));
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_finish_reason() {
        assert_eq!(parse_finish_reason(Some("stop")), Some(FinishReason::Stop));
        assert_eq!(
            parse_finish_reason(Some("tool_calls")),
            Some(FinishReason::ToolCalls)
        );
        assert_eq!(parse_finish_reason(None), None);
    }

    #[test]
    fn test_model_response_text_sets_stop() {
        let resp = ModelResponse::text("hi");
        assert_eq!(resp.finish_reason, Some(FinishReason::Stop));
        assert_eq!(resp.text, "hi");
    }

    #[test]
    fn test_options_with_tools_enables_flag() {
        let opts = ModelOptions::default().with_tools(vec![]);
        assert!(!opts.enable_tool_calls);
        let def = ToolDefinition {
            name: "t".into(),
            description: "".into(),
            parameters: vec![],
            required: vec![],
        };
        let opts = ModelOptions::default().with_tools(vec![def]);
        assert!(opts.enable_tool_calls);
    }

    #[test]
    fn test_build_request_maps_roles() {
        let model = OpenAiCompatibleModel::new("http://localhost:1234/v1", "test-model");
        let messages = [Message::user("hi"), Message::system("sys")];
        let opts = ModelOptions::default();
        let req = model.build_request(&messages, &opts, false);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.messages[1].role, "system");
        assert!(!req.stream);
    }
}
