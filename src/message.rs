//! # Message Model
//!
//! Immutable conversation messages with typed roles and content parts.
//!
//! A [`Message`] is a value record: once appended to a [`crate::memory::Memory`]
//! it is never mutated. Each message gets a fresh, process-unique `id` at
//! construction time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

/// A single unit of content within a message.
///
/// A message's `content` field holds a plain-text summary; `parts` holds the
/// full structured content, which may include zero or more of these blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    Image(ImageBlock),
    File(FileBlock),
    Json(JsonBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

/// Plain text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Hint for how an image was sourced; mirrors the `detail` parameter some
/// vision-capable backends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

/// Image content, either a URL/data-URI or base64-encoded bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBlock {
    url: String,
    mime_type: Option<String>,
    detail: ImageDetail,
}

impl ImageBlock {
    /// Build an image block from a URL or data URI. Rejects an empty string.
    pub fn from_url(url: impl Into<String>) -> crate::error::Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(crate::error::Error::invalid_input("image url must not be empty"));
        }
        Ok(Self {
            url,
            mime_type: None,
            detail: ImageDetail::Auto,
        })
    }

    /// Build an image block from base64-encoded bytes and a MIME type, encoding
    /// it as a `data:` URI.
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> crate::error::Result<Self> {
        use base64::Engine as _;
        if base64::engine::general_purpose::STANDARD.decode(data).is_err() {
            return Err(crate::error::Error::invalid_input("invalid base64 image data"));
        }
        let mime_type = mime_type.into();
        Ok(Self {
            url: format!("data:{mime_type};base64,{data}"),
            mime_type: Some(mime_type),
            detail: ImageDetail::Auto,
        })
    }

    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn detail(&self) -> ImageDetail {
        self.detail
    }
}

/// Opaque file content (e.g. a document attachment), referenced by URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBlock {
    pub uri: String,
    pub mime_type: Option<String>,
    pub name: Option<String>,
}

impl FileBlock {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            name: None,
        }
    }
}

/// Structured JSON content, used for tool-mediated data exchange that isn't
/// naturally text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBlock {
    pub value: serde_json::Value,
}

/// A tool call the model requested, attached to an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// The result of executing a tool, attached to a tool-role message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

/// An immutable conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    /// Plain-text summary of the message, possibly empty if `parts` carries
    /// non-text content exclusively.
    pub content: String,
    pub parts: Vec<ContentBlock>,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// Construct a message from content parts, deriving the plain-text
    /// summary by joining every `Text` part with `\n`.
    pub fn new(role: MessageRole, parts: Vec<ContentBlock>) -> Self {
        let content = parts
            .iter()
            .filter_map(|p| match p {
                ContentBlock::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            parts,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Construct a text-only message directly from a string, skipping
    /// `parts` entirely. Convenient for the common case.
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            parts: Vec::new(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    pub fn assistant(parts: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, parts)
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Tool, content)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_vector() {
        let msg = Message::new(MessageRole::User, vec![]);
        assert_eq!(msg.parts.len(), 0);
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_text_joins_with_newline() {
        let msg = Message::new(
            MessageRole::User,
            vec![
                ContentBlock::Text(TextBlock::new("Line 1")),
                ContentBlock::Text(TextBlock::new("Line 2")),
            ],
        );
        assert_eq!(msg.content, "Line 1\nLine 2");
    }

    #[test]
    fn test_image_only_message() {
        let img = ImageBlock::from_url("https://example.com/img.jpg").unwrap();
        let msg = Message::new(MessageRole::User, vec![ContentBlock::Image(img)]);
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_rejects_empty_url() {
        assert!(ImageBlock::from_url("").is_err());
    }

    #[test]
    fn test_data_uri_round_trip() {
        let img = ImageBlock::from_base64("AAAA", "image/png").unwrap();
        assert!(img.url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_with_detail() {
        let img = ImageBlock::from_url("https://example.com/1.jpg")
            .unwrap()
            .with_detail(ImageDetail::Low);
        assert_eq!(img.detail(), ImageDetail::Low);
    }
}
