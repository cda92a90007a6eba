//! # Error Types
//!
//! Comprehensive error handling for the ReAct engine and its collaborators.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: every fallible operation returns `Result<T>`.
//! - **No Silent Failures**: errors are propagated explicitly, never swallowed.
//! - **Rich Context**: each variant carries enough information to act on.
//! - **Typed Propagation Policy**: the taxonomy mirrors the engine's error
//!   handling design — configuration errors abort construction, parsing and
//!   model errors become error observations inside a cycle, lifecycle and
//!   cancellation errors abort the current run.

use thiserror::Error;

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type covering every failure mode in the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (network, TLS, or non-2xx response from a model backend).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing required component or invalid value supplied to a builder/constructor.
    ///
    /// Covers: missing model/thought-generator/selector/response-generator/cycle-manager,
    /// and `ErrNoToolsProvided` for a strict-mode ReAct agent built with an empty toolset.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error response received from the model server's API (request succeeded, reply is an error).
    #[error("API error: {0}")]
    Api(String),

    /// Failure while processing a streaming model response.
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution or registration failed.
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// A requested tool name does not resolve in the current toolset at dispatch time.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid input provided by the caller (e.g. an empty user message).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The model produced empty output where non-empty text was required.
    #[error("Model produced empty output")]
    EmptyModelOutput,

    /// No Action could be recovered from the Thought (structured, JSON, or ReAct text all failed).
    #[error("No action could be parsed from the model's output")]
    NoActionFound,

    /// The action named a tool absent from the toolset.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The action's arguments could not be parsed (malformed JSON, unparsable key=value pairs).
    #[error("Failed to parse action arguments: {0}")]
    ArgumentParse(String),

    /// A required tool parameter was missing from the coerced argument map.
    #[error("Missing required argument: {0}")]
    MissingRequired(String),

    /// `StartCycle` called while a cycle is already open for this session.
    #[error("A cycle is already open for this session")]
    CycleAlreadyOpen,

    /// `RecordAction`/`RecordObservation`/`EndCycle` called with no open cycle.
    #[error("No cycle is open for this session")]
    CycleNotOpen,

    /// Request or operation exceeded its configured timeout.
    #[error("Request timeout")]
    Timeout,

    /// The ambient context was cancelled before the operation completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A lifecycle hook blocked execution.
    #[error("Blocked by hook: {0}")]
    HookBlocked(String),

    /// Miscellaneous error that doesn't fit another category.
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an API error carrying the backend's message.
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a streaming error.
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a tool execution error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a hook-blocked error with the hook's stated reason.
    pub fn hook_blocked(msg: impl Into<String>) -> Self {
        Error::HookBlocked(msg.into())
    }

    /// Create a miscellaneous error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// True if this error should be recorded as an error Observation and the
    /// loop continued, rather than aborting the current `Run`/`RunAsync`.
    ///
    /// Matches the propagation policy in the error handling design: model and
    /// parsing errors inside a cycle are recoverable; lifecycle, timeout, and
    /// cancellation errors are not.
    pub fn is_recoverable_in_cycle(&self) -> bool {
        matches!(
            self,
            Error::Api(_)
                | Error::Stream(_)
                | Error::Tool(_)
                | Error::ToolNotFound(_)
                | Error::EmptyModelOutput
                | Error::NoActionFound
                | Error::UnknownTool(_)
                | Error::ArgumentParse(_)
                | Error::MissingRequired(_)
                | Error::HookBlocked(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::config("missing model");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: missing model");
    }

    #[test]
    fn test_error_timeout() {
        let err = Error::timeout();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(err.to_string(), "Request timeout");
    }

    #[test]
    fn test_recoverable_in_cycle() {
        assert!(Error::ToolNotFound("x".into()).is_recoverable_in_cycle());
        assert!(Error::NoActionFound.is_recoverable_in_cycle());
        assert!(!Error::CycleAlreadyOpen.is_recoverable_in_cycle());
        assert!(!Error::Cancelled.is_recoverable_in_cycle());
        assert!(!Error::Config("x".into()).is_recoverable_in_cycle());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn _ok() -> Result<i32> {
            Ok(42)
        }
        fn _err() -> Result<i32> {
            Err(Error::timeout())
        }
    }
}
