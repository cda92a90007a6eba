//! # react-agent-core
//!
//! A Reason-Act (ReAct) execution engine and the agent composition substrate
//! around it: a bounded Thought/Action/Observation loop over pluggable
//! models and tools, with streaming events, parallel/sequential agent
//! composition, and a session-scoped runner.
//!
//! ## Key Features
//!
//! - **Pluggable models and tools**: the loop depends only on the
//!   [`Model`]/[`StreamingModel`] and [`Tool`] traits; bring your own backend.
//! - **Streaming-first**: [`ReActAgent::run_async`] emits a typed event per
//!   reasoning step, terminated by exactly one `Message` or `Error` event.
//! - **Bounded by design**: a max-iteration cap, final-answer-marker
//!   detection, and approximate-repetition detection each independently
//!   terminate the loop.
//! - **Agent composition**: [`composite::ParallelAgent`] fans a message out
//!   to several agents and joins their replies; [`composite::SequentialAgent`]
//!   pipes one agent's output into the next.
//! - **Lifecycle hooks**: intercept tool dispatch and prompt submission to
//!   block or modify in flight.
//! - **Session-scoped runner**: create/get/delete/list sessions with
//!   TTL-based lazy eviction.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use react_agent::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<()> {
//! let model = Arc::new(OpenAiCompatibleModel::new(
//!     "http://localhost:1234/v1",
//!     "qwen2.5-32b-instruct",
//! ));
//!
//! let agent = ReActAgent::builder("assistant")
//!     .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
//!     .response_generator(Arc::new(DirectResponseGenerator))
//!     .build()?;
//!
//! let reply = agent.run("session-1", Message::user("What's 2 + 2?")).await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **message**: conversation messages and content parts
//! - **event**: the streaming event taxonomy and channel helpers
//! - **tool**: the Tool trait, JSON-schema-like parameter declarations, and
//!   argument coercion
//! - **model**: the Model/StreamingModel traits, plus a concrete
//!   OpenAI-compatible reference backend
//! - **memory** / **cycle**: per-session message log and the Cycle state
//!   machine
//! - **thought** / **action** / **response**: the three pluggable generators
//!   the engine drives each iteration
//! - **engine**: the ReAct loop itself and its termination heuristics
//! - **composite**: parallel/sequential agent composition
//! - **session** / **runner**: session bookkeeping over any Agent
//! - **hooks**: lifecycle interception points
//! - **context**: token estimation and history truncation
//! - **retry**: exponential backoff with jitter
//! - **config**: local-server provider configuration helpers
//! - **error**: the crate's Error enum and Result alias

mod action;
mod composite;
mod config;
mod context;
mod cycle;
mod engine;
mod error;
mod event;
mod hooks;
mod memory;
mod message;
mod model;
mod response;
mod retry;
mod runner;
mod session;
mod thought;
mod tool;

/// Exponential backoff with jitter. Made public as a module so callers can
/// apply the same retry policy to their own tool implementations.
pub use retry::{retry, RetryConfig};

// --- Messages & events ---

pub use message::{
    ContentBlock, FileBlock, ImageBlock, ImageDetail, JsonBlock, Message, MessageRole, TextBlock,
    ToolResultBlock, ToolUseBlock,
};

pub use event::{event_channel, Event, EventData, EventReceiver, EventSender};

// --- Tools ---

pub use tool::{
    coerce_arguments, ParamType, ParameterSchema, Tool, ToolContext, ToolDefinition, ToolOutput,
    ToolSet,
};

// --- Models ---

pub use model::{
    FinishReason, Model, ModelOptions, ModelResponse, ModelStream, OpenAiCompatibleModel,
    StreamingModel, ToolCall,
};

// --- Memory & cycles ---

pub use memory::{InMemoryMemory, Memory, SessionMemories};
pub use cycle::{Cycle, CycleManager};

// --- Pluggable generators ---

pub use thought::{DefaultThoughtGenerator, Thought, ThoughtFormat, ThoughtGenerator};
pub use action::{Action, ActionSelector, DefaultActionSelector, Observation, ObservationKind};
pub use response::{
    DirectResponseGenerator, ModelMediatedResponseGenerator, ResponseGenerator, CANNED_APOLOGY,
};

// --- Engine ---

pub use engine::{
    Agent, CancellationHandle, ReActAgent, ReActAgentBuilder, DEFAULT_MAX_ITERATIONS,
    REPETITION_THRESHOLD,
};

// --- Composition ---

pub use composite::{ErrorPolicy, ParallelAgent, PipelineHook, SequentialAgent};

// --- Hooks ---

pub use hooks::{
    Hook, HookDecision, Hooks, PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent,
    HOOK_POST_TOOL_USE, HOOK_PRE_TOOL_USE, HOOK_USER_PROMPT_SUBMIT,
};

// --- Sessions ---

pub use session::{SessionInfo, SessionLog};
pub use runner::{Runner, DEFAULT_SESSION_TTL};

// --- Context management ---

pub use context::{estimate_messages_tokens, estimate_tokens, is_approaching_limit, truncate_messages};

// --- Provider configuration ---

pub use config::{get_base_url, get_model, Provider};

// --- Errors ---

pub use error::{Error, Result};

/// Convenience re-exports for the common path: build a [`ReActAgent`], run
/// it, and handle its [`Message`]/[`Error`] surface.
pub mod prelude {
    pub use crate::{
        Action, Agent, CancellationHandle, Cycle, DefaultActionSelector, DefaultThoughtGenerator,
        DirectResponseGenerator, Error, Event, EventData, HookDecision, Hooks, Message,
        MessageRole, Model, ModelMediatedResponseGenerator, ModelOptions, Observation,
        OpenAiCompatibleModel, ParallelAgent, ReActAgent, ReActAgentBuilder, ResponseGenerator,
        ParamType, ParameterSchema, Result, Runner, SequentialAgent, Thought, ThoughtFormat,
        ThoughtGenerator, Tool, ToolContext, ToolDefinition, ToolOutput, ToolSet,
    };
}
