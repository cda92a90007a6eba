//! # Lifecycle Hooks
//!
//! Hooks intercept the engine at three points — before a tool runs, after a
//! tool runs, and before a prompt is submitted to the model — and can let
//! execution continue, block it with a reason, or modify the value in
//! flight. Hooks run sequentially; the first non-`Continue` decision wins.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::message::Message;

/// Constant identifier for the PreToolUse hook point.
pub const HOOK_PRE_TOOL_USE: &str = "pre_tool_use";
/// Constant identifier for the PostToolUse hook point.
pub const HOOK_POST_TOOL_USE: &str = "post_tool_use";
/// Constant identifier for the UserPromptSubmit hook point.
pub const HOOK_USER_PROMPT_SUBMIT: &str = "user_prompt_submit";

/// A hook's verdict on the event it was given.
#[derive(Debug, Clone)]
pub enum HookDecision {
    /// Proceed unmodified.
    Continue,
    /// Abort this step; the engine records an error observation rather than
    /// aborting the whole run.
    Block(String),
    /// Proceed with a replacement value (modified tool input or prompt).
    Modify(Value),
}

/// Event passed to `pre_tool_use`, before a tool is dispatched.
pub struct PreToolUseEvent {
    pub tool_name: String,
    pub input: Value,
    pub action_id: String,
    pub history: Vec<Message>,
}

/// Event passed to `post_tool_use`, after a tool resolves.
pub struct PostToolUseEvent {
    pub tool_name: String,
    pub input: Value,
    pub action_id: String,
    pub result: Value,
    pub is_error: bool,
    pub history: Vec<Message>,
}

/// Event passed to `user_prompt_submit`, before the first thought of a run
/// is generated.
pub struct UserPromptSubmitEvent {
    pub prompt: String,
    pub history: Vec<Message>,
}

/// A lifecycle hook. All methods default to a pass-through `Continue`; only
/// override what you need.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn pre_tool_use(&self, _event: &PreToolUseEvent) -> HookDecision {
        HookDecision::Continue
    }

    async fn post_tool_use(&self, _event: &PostToolUseEvent) -> HookDecision {
        HookDecision::Continue
    }

    async fn user_prompt_submit(&self, _event: &UserPromptSubmitEvent) -> HookDecision {
        HookDecision::Continue
    }
}

/// An ordered collection of hooks, run sequentially at each lifecycle point.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: Vec<Arc<dyn Hook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub async fn run_pre_tool_use(&self, event: &PreToolUseEvent) -> HookDecision {
        for hook in &self.hooks {
            match hook.pre_tool_use(event).await {
                HookDecision::Continue => continue,
                decision => return decision,
            }
        }
        HookDecision::Continue
    }

    pub async fn run_post_tool_use(&self, event: &PostToolUseEvent) -> HookDecision {
        for hook in &self.hooks {
            match hook.post_tool_use(event).await {
                HookDecision::Continue => continue,
                decision => return decision,
            }
        }
        HookDecision::Continue
    }

    pub async fn run_user_prompt_submit(&self, event: &UserPromptSubmitEvent) -> HookDecision {
        for hook in &self.hooks {
            match hook.user_prompt_submit(event).await {
                HookDecision::Continue => continue,
                decision => return decision,
            }
        }
        HookDecision::Continue
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
