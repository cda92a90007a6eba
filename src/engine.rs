//! # ReAct Engine
//!
//! Drives the Thought -> Action -> Observation loop to completion, either
//! all at once ([`ReActAgent::run`]) or as a stream of [`Event`]s
//! ([`ReActAgent::run_async`]). Termination is governed by three
//! heuristics checked in order each iteration: a final-answer marker in the
//! thought, approximate repetition across the last three closed cycles'
//! tool invocations, and the configured iteration cap.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::action::{Action, ActionSelector, DefaultActionSelector, Observation};
use crate::cycle::{Cycle, CycleManager};
use crate::error::{Error, Result};
use crate::event::{event_channel, Event, EventReceiver};
use crate::hooks::{Hook, HookDecision, Hooks, PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent};
use crate::memory::{Memory, SessionMemories};
use crate::message::Message;
use crate::response::ResponseGenerator;
use crate::thought::{Thought, ThoughtFormat, ThoughtGenerator};
use crate::tool::{Tool, ToolContext, ToolSet};

/// Default cap on loop iterations before the engine forces a response via
/// the configured [`ResponseGenerator`].
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Similarity threshold above which two thoughts are considered an
/// approximate repeat.
pub const REPETITION_THRESHOLD: f64 = 0.8;

/// Sorensen-Dice coefficient over each string's character-frequency bag.
/// Order-insensitive by design: the loop should catch a thought that
/// restates the same reasoning in a different word order, not just an
/// exact repeat.
fn char_bag_similarity(a: &str, b: &str) -> f64 {
    let mut bag_a: HashMap<char, usize> = HashMap::new();
    for c in a.chars() {
        *bag_a.entry(c).or_insert(0) += 1;
    }
    let mut bag_b: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *bag_b.entry(c).or_insert(0) += 1;
    }
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut intersection = 0usize;
    for (c, &count_a) in &bag_a {
        if let Some(&count_b) = bag_b.get(c) {
            intersection += count_a.min(count_b);
        }
    }
    (2.0 * intersection as f64) / total as f64
}

/// True if the last three closed cycles all invoked the same tool with
/// approximately the same (serialized) input: the engine is looping on one
/// action without making progress.
fn is_repeating_action(history: &[Cycle]) -> bool {
    if history.len() < 3 {
        return false;
    }
    let last_three = &history[history.len() - 3..];
    let actions: Vec<&Action> = last_three.iter().filter_map(Cycle::action).collect();
    if actions.len() < 3 {
        return false;
    }
    actions.windows(2).all(|pair| {
        pair[0].tool_name == pair[1].tool_name
            && char_bag_similarity(&pair[0].input_json_string(), &pair[1].input_json_string())
                >= REPETITION_THRESHOLD
    })
}

/// Synthesize a final answer from the last successful observation in
/// `history`, used when the loop detects it is repeating the same action.
fn synthesize_from_last_success(history: &[Cycle]) -> Option<Message> {
    history.iter().rev().find_map(|cycle| {
        let action = cycle.action()?;
        let observation = cycle.observation()?;
        if observation.is_error {
            return None;
        }
        let result = observation.output_text().unwrap_or_default();
        Some(Message::assistant_text(format!(
            "After analyzing the request, I used the {} tool and found that the result is: {result}",
            action.tool_name
        )))
    })
}

fn error_code(err: &Error) -> i32 {
    match err {
        Error::Cancelled => 499,
        Error::Timeout => 408,
        Error::Config(_) => 500,
        Error::HookBlocked(_) => 403,
        _ => 500,
    }
}

/// Uniform surface over a runnable agent, implemented by [`ReActAgent`] and
/// by the composite agents in [`crate::composite`] so they can be nested.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, session_id: &str, user_message: Message) -> Result<Message>;

    /// Discard any per-session state this agent holds. No-op by default;
    /// overridden by agents (and composites, which cascade to children)
    /// that keep session-scoped history.
    async fn clear_session(&self, _session_id: &str) {}
}

/// Outcome of a single loop iteration.
enum CycleStep {
    Final(Message),
    Continue,
}

/// A configured Thought/Action/Observation loop over a fixed tool set.
///
/// Cheap to clone: all shared state (`ToolSet`, `CycleManager`,
/// `SessionMemories`, `Hooks`) is reference-counted internally.
#[derive(Clone)]
pub struct ReActAgent {
    name: String,
    description: String,
    tools: ToolSet,
    thought_generator: Arc<dyn ThoughtGenerator>,
    action_selector: Arc<dyn ActionSelector>,
    response_generator: Arc<dyn ResponseGenerator>,
    cycle_manager: CycleManager,
    memories: SessionMemories,
    hooks: Hooks,
    max_iterations: usize,
    format: ThoughtFormat,
}

impl ReActAgent {
    pub fn builder(name: impl Into<String>) -> ReActAgentBuilder {
        ReActAgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }

    /// Drop all cycle and memory state for `session_id`.
    pub async fn clear_session(&self, session_id: &str) {
        self.cycle_manager.clear(session_id).await;
        self.memories.remove(session_id).await;
    }

    /// The closed-cycle history for `session_id`, oldest first.
    pub async fn history(&self, session_id: &str) -> Vec<Cycle> {
        self.cycle_manager.get_history(session_id).await
    }

    /// The stored message log for `session_id`, oldest first.
    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.memories.get_or_create(session_id).await.retrieve().await
    }

    /// Run to completion without streaming, returning only the final message.
    pub async fn run(&self, session_id: &str, user_message: Message) -> Result<Message> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.drive(session_id, user_message, None, &cancel_rx).await
    }

    /// Run a single loop iteration and return the resulting cycle. A thin
    /// wrapper over the same step `run`/`run_async` drive internally; useful
    /// for callers that want manual control over pacing between iterations.
    pub async fn run_react_cycle(&self, session_id: &str, user_message: &Message) -> Result<Cycle> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_one_cycle(session_id, user_message, None, &cancel_rx)
            .await?;
        self.cycle_manager
            .get_history(session_id)
            .await
            .into_iter()
            .next_back()
            .ok_or(Error::CycleNotOpen)
    }

    /// Run to completion, streaming [`Event`]s over the returned channel.
    /// The channel's terminal event is always exactly one `Message` or
    /// `Error`. Returns a handle that can be used to request
    /// cooperative cancellation.
    pub fn run_async(
        &self,
        session_id: impl Into<String>,
        user_message: Message,
    ) -> (EventReceiver, CancellationHandle) {
        let (tx, rx) = event_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let agent = self.clone();
        let session_id = session_id.into();
        tokio::spawn(async move {
            let result = agent
                .drive(&session_id, user_message, Some(&tx), &cancel_rx)
                .await;
            match result {
                Ok(message) => {
                    let _ = tx.send(Event::message(message)).await;
                }
                Err(err) => {
                    let code = error_code(&err);
                    let _ = tx.send(Event::error(err.to_string(), code)).await;
                }
            }
        });
        (rx, CancellationHandle::new(cancel_tx))
    }

    async fn prepare_session(&self, session_id: &str, user_message: &Message) -> Result<Message> {
        let memory = self.memories.get_or_create(session_id).await;
        let history = memory.retrieve().await?;
        let event = UserPromptSubmitEvent {
            prompt: user_message.content.clone(),
            history,
        };
        let effective = match self.hooks.run_user_prompt_submit(&event).await {
            HookDecision::Block(reason) => return Err(Error::hook_blocked(reason)),
            HookDecision::Modify(Value::String(text)) => Message::user(text),
            _ => user_message.clone(),
        };
        memory.store(effective.clone()).await?;
        Ok(effective)
    }

    async fn drive(
        &self,
        session_id: &str,
        user_message: Message,
        emit: Option<&crate::event::EventSender>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Message> {
        let user_message = self.prepare_session(session_id, &user_message).await?;

        for _ in 0..self.max_iterations {
            match self
                .run_one_cycle(session_id, &user_message, emit, cancel)
                .await?
            {
                CycleStep::Final(message) => {
                    self.memories
                        .get_or_create(session_id)
                        .await
                        .store(message.clone())
                        .await?;
                    return Ok(message);
                }
                CycleStep::Continue => continue,
            }
        }

        let cycles = self.cycle_manager.get_history(session_id).await;
        let message = self
            .response_generator
            .generate(&user_message, &cycles)
            .await?;
        self.memories
            .get_or_create(session_id)
            .await
            .store(message.clone())
            .await?;
        Ok(message)
    }

    async fn run_one_cycle(
        &self,
        session_id: &str,
        user_message: &Message,
        emit: Option<&crate::event::EventSender>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<CycleStep> {
        if *cancel.borrow() {
            return Err(Error::Cancelled);
        }

        let prior_cycles = self.cycle_manager.get_history(session_id).await;

        if is_repeating_action(&prior_cycles) {
            if let Some(tx) = emit {
                let _ = tx
                    .send(Event::observation(
                        "repeated tool invocation detected, ending loop",
                    ))
                    .await;
            }
            let message = match synthesize_from_last_success(&prior_cycles) {
                Some(message) => message,
                None => {
                    self.response_generator
                        .generate(user_message, &prior_cycles)
                        .await?
                }
            };
            return Ok(CycleStep::Final(message));
        }

        let tool_defs = self.tools.definitions();
        let thought = self
            .thought_generator
            .generate(user_message, &prior_cycles, &tool_defs, self.format)
            .await?;

        if let Some(tx) = emit {
            let _ = tx.send(Event::thinking(thought.content.clone())).await;
        }

        if thought.contains_final_answer_marker() {
            return self.finalize(session_id, user_message, thought).await;
        }

        self.cycle_manager.start_cycle(session_id, thought.clone()).await?;
        log::debug!("session {session_id}: cycle opened");

        let actions = match self.action_selector.select(&thought, &self.tools).await {
            Ok(actions) => actions,
            Err(e) if e.is_recoverable_in_cycle() => {
                if let Some(tx) = emit {
                    let _ = tx
                        .send(Event::observation(format!("no action taken: {e}")))
                        .await;
                }
                self.cycle_manager.end_cycle(session_id).await?;
                return Ok(CycleStep::Continue);
            }
            Err(e) => return Err(e),
        };

        let Some(action) = actions.into_iter().next() else {
            self.cycle_manager.end_cycle(session_id).await?;
            return Ok(CycleStep::Continue);
        };

        self.cycle_manager.record_action(session_id, action.clone()).await?;
        if let Some(tx) = emit {
            let _ = tx
                .send(Event::tool(action.tool_name.clone(), action.input_json_string()))
                .await;
        }

        if action.tool_name == "final_answer" {
            let content = action
                .tool_input
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let observation = Observation::success(action.id.clone(), Value::String(content.clone()));
            if let Some(tx) = emit {
                let _ = tx.send(Event::observation(content.clone())).await;
            }
            self.cycle_manager
                .record_observation(session_id, observation)
                .await?;
            self.cycle_manager.end_cycle(session_id).await?;
            log::debug!("session {session_id}: cycle closed via final_answer action");
            return Ok(CycleStep::Final(Message::assistant_text(content)));
        }

        log::debug!("session {session_id}: dispatching tool {}", action.tool_name);

        let observation = self.dispatch_tool(session_id, &action, cancel).await?;
        if observation.is_error {
            log::warn!(
                "session {session_id}: tool {} returned an error observation",
                action.tool_name
            );
        }

        if let Some(tx) = emit {
            let text = if observation.is_error {
                format!("error: {}", observation.error_text().unwrap_or_default())
            } else {
                observation.output_text().unwrap_or_default()
            };
            let _ = tx.send(Event::observation(text)).await;
        }

        self.cycle_manager
            .record_observation(session_id, observation)
            .await?;
        self.cycle_manager.end_cycle(session_id).await?;
        log::debug!("session {session_id}: cycle closed");

        Ok(CycleStep::Continue)
    }

    async fn finalize(
        &self,
        session_id: &str,
        user_message: &Message,
        thought: Thought,
    ) -> Result<CycleStep> {
        self.cycle_manager.start_cycle(session_id, thought).await?;
        self.cycle_manager.end_cycle(session_id).await?;
        let cycles = self.cycle_manager.get_history(session_id).await;
        let message = self
            .response_generator
            .generate(user_message, &cycles)
            .await?;
        Ok(CycleStep::Final(message))
    }

    async fn dispatch_tool(
        &self,
        session_id: &str,
        action: &Action,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Observation> {
        let history = self.memories.get_or_create(session_id).await.retrieve().await?;
        let pre_event = PreToolUseEvent {
            tool_name: action.tool_name.clone(),
            input: Value::Object(action.tool_input.clone()),
            action_id: action.id.clone(),
            history: history.clone(),
        };

        let mut args = action.input_as_map();
        let blocked_reason = match self.hooks.run_pre_tool_use(&pre_event).await {
            HookDecision::Block(reason) => Some(reason),
            HookDecision::Modify(Value::Object(modified)) => {
                args = modified.into_iter().collect();
                None
            }
            _ => None,
        };

        let observation = if let Some(reason) = blocked_reason {
            Observation::error(action.id.clone(), format!("blocked by hook: {reason}"))
        } else {
            match self.tools.get(&action.tool_name) {
                None => Observation::error(
                    action.id.clone(),
                    format!("unknown tool: {}", action.tool_name),
                ),
                Some(tool) => self.execute_tool(tool, action, args, cancel).await?,
            }
        };

        let post_event = PostToolUseEvent {
            tool_name: action.tool_name.clone(),
            input: Value::Object(action.tool_input.clone()),
            action_id: action.id.clone(),
            result: observation.tool_output.output.clone().unwrap_or(Value::Null),
            is_error: observation.is_error,
            history,
        };

        let observation = match self.hooks.run_post_tool_use(&post_event).await {
            HookDecision::Block(reason) => Observation::error(action.id.clone(), reason),
            HookDecision::Modify(value) if !observation.is_error => {
                Observation::success(action.id.clone(), value)
            }
            _ => observation,
        };

        Ok(observation)
    }

    async fn execute_tool(
        &self,
        tool: &Arc<dyn Tool>,
        action: &Action,
        args: HashMap<String, Value>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Observation> {
        let ctx = ToolContext::with_cancellation(cancel.clone());
        match tool.execute(&ctx, args).await {
            Ok(output) => Ok(Observation::success(action.id.clone(), output.output)),
            Err(e) if e.is_recoverable_in_cycle() => {
                Ok(Observation::error(action.id.clone(), e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Agent for ReActAgent {
    fn name(&self) -> &str {
        self.name()
    }

    async fn run(&self, session_id: &str, user_message: Message) -> Result<Message> {
        self.run(session_id, user_message).await
    }

    async fn clear_session(&self, session_id: &str) {
        self.clear_session(session_id).await
    }
}

/// A handle for requesting cooperative cancellation of a `run_async` call.
/// Cancellation is checked between iterations and passed down to the active
/// tool via [`crate::tool::ToolContext`]; an in-flight tool call is never
/// forcibly aborted.
#[derive(Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    fn new(tx: watch::Sender<bool>) -> Self {
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Builds a [`ReActAgent`] from its required collaborators.
pub struct ReActAgentBuilder {
    name: String,
    description: String,
    tools: ToolSet,
    thought_generator: Option<Arc<dyn ThoughtGenerator>>,
    action_selector: Option<Arc<dyn ActionSelector>>,
    response_generator: Option<Arc<dyn ResponseGenerator>>,
    hooks: Hooks,
    max_iterations: usize,
    format: ThoughtFormat,
}

impl ReActAgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tools: ToolSet::new(),
            thought_generator: None,
            action_selector: None,
            response_generator: None,
            hooks: Hooks::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            format: ThoughtFormat::Free,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.tools.add(tool)?;
        Ok(self)
    }

    pub fn thought_generator(mut self, generator: Arc<dyn ThoughtGenerator>) -> Self {
        self.thought_generator = Some(generator);
        self
    }

    pub fn action_selector(mut self, selector: Arc<dyn ActionSelector>) -> Self {
        self.action_selector = Some(selector);
        self
    }

    pub fn response_generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.response_generator = Some(generator);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn format(mut self, format: ThoughtFormat) -> Self {
        self.format = format;
        self
    }

    pub fn build(self) -> Result<ReActAgent> {
        let thought_generator = self
            .thought_generator
            .ok_or_else(|| Error::config("a thought_generator is required"))?;
        let response_generator = self
            .response_generator
            .ok_or_else(|| Error::config("a response_generator is required"))?;
        let action_selector = self
            .action_selector
            .unwrap_or_else(|| Arc::new(DefaultActionSelector::new()));

        Ok(ReActAgent {
            name: self.name,
            description: self.description,
            tools: self.tools,
            thought_generator,
            action_selector,
            response_generator,
            cycle_manager: CycleManager::new(),
            memories: SessionMemories::new(),
            hooks: self.hooks,
            max_iterations: self.max_iterations,
            format: self.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as CrateResult;
    use crate::model::{Model, ModelOptions, ModelResponse};
    use crate::response::DirectResponseGenerator;
    use crate::thought::DefaultThoughtGenerator;
    use crate::tool::{ParamType, ParameterSchema, ToolDefinition, ToolOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_char_bag_similarity_identical() {
        assert_eq!(char_bag_similarity("hello", "hello"), 1.0);
    }

    #[test]
    fn test_char_bag_similarity_disjoint() {
        assert_eq!(char_bag_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_is_repeating_action_requires_three_closed_cycles() {
        assert!(!is_repeating_action(&[]));
    }

    async fn closed_search_cycle(mgr: &CycleManager, session_id: &str, query: &str) {
        let thought = Thought::new("searching", ThoughtFormat::Free);
        let thought_id = thought.id.clone();
        mgr.start_cycle(session_id, thought).await.unwrap();
        let mut input = serde_json::Map::new();
        input.insert("q".into(), Value::String(query.into()));
        let action = Action::new(thought_id, "search", input);
        let action_id = action.id.clone();
        mgr.record_action(session_id, action).await.unwrap();
        mgr.record_observation(
            session_id,
            Observation::success(action_id, Value::String("a result".into())),
        )
        .await
        .unwrap();
        mgr.end_cycle(session_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_is_repeating_action_true_for_three_identical_tool_calls() {
        let mgr = CycleManager::new();
        for _ in 0..3 {
            closed_search_cycle(&mgr, "s1", "x").await;
        }
        let history = mgr.get_history("s1").await;
        assert!(is_repeating_action(&history));
    }

    #[tokio::test]
    async fn test_is_repeating_action_false_for_varied_inputs() {
        let mgr = CycleManager::new();
        for query in ["a", "b", "c"] {
            closed_search_cycle(&mgr, "s1", query).await;
        }
        let history = mgr.get_history("s1").await;
        assert!(!is_repeating_action(&history));
    }

    #[tokio::test]
    async fn test_synthesize_from_last_success_formats_message() {
        let mgr = CycleManager::new();
        closed_search_cycle(&mgr, "s1", "x").await;
        let history = mgr.get_history("s1").await;
        let message = synthesize_from_last_success(&history).unwrap();
        assert_eq!(
            message.content,
            "After analyzing the request, I used the search tool and found that the result is: a result"
        );
    }

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Model for Echo {
        async fn generate(&self, _prompt: &str, _opts: &ModelOptions) -> CrateResult<ModelResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(ModelResponse::text("Thought: I should add the numbers."))
            } else {
                Ok(ModelResponse::text("Final Answer: 7"))
            }
        }

        async fn generate_with_messages(
            &self,
            _messages: &[Message],
            opts: &ModelOptions,
        ) -> CrateResult<ModelResponse> {
            self.generate("", opts).await
        }
    }

    struct Adder;

    #[async_trait]
    impl Tool for Adder {
        fn name(&self) -> &str {
            "add"
        }
        fn description(&self) -> &str {
            "Adds two numbers"
        }
        fn get_definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "add".into(),
                description: "Adds two numbers".into(),
                parameters: vec![
                    ("a".into(), ParameterSchema::new(ParamType::Number, "first")),
                    ("b".into(), ParameterSchema::new(ParamType::Number, "second")),
                ],
                required: vec!["a".into(), "b".into()],
            }
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            args: HashMap<String, Value>,
        ) -> CrateResult<ToolOutput> {
            let a = args.get("a").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let b = args.get("b").and_then(|v| v.as_f64()).unwrap_or(0.0);
            Ok(ToolOutput::text((a + b).to_string()))
        }
    }

    #[tokio::test]
    async fn test_run_reaches_final_answer() {
        let model = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let agent = ReActAgent::builder("tester")
            .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
            .response_generator(Arc::new(DirectResponseGenerator))
            .tool(Arc::new(Adder))
            .unwrap()
            .max_iterations(3)
            .build()
            .unwrap();

        let reply = agent.run("session-1", Message::user("what is 3 + 4?")).await.unwrap();
        assert_eq!(reply.content, "7");

        let history = agent.history("session-1").await;
        assert_eq!(history.len(), 1);
    }

    struct SameThought;

    #[async_trait]
    impl ThoughtGenerator for SameThought {
        async fn generate(
            &self,
            _user_message: &Message,
            _prior_cycles: &[Cycle],
            _tools: &[ToolDefinition],
            format: ThoughtFormat,
        ) -> CrateResult<Thought> {
            Ok(Thought::new("I should search for x.", format))
        }
    }

    struct AlwaysSearchX;

    #[async_trait]
    impl ActionSelector for AlwaysSearchX {
        async fn select(&self, thought: &Thought, _tools: &ToolSet) -> CrateResult<Vec<Action>> {
            let mut input = serde_json::Map::new();
            input.insert("q".into(), Value::String("x".into()));
            Ok(vec![Action::new(thought.id.clone(), "search", input)])
        }
    }

    struct Search;

    #[async_trait]
    impl Tool for Search {
        fn name(&self) -> &str {
            "search"
        }
        fn description(&self) -> &str {
            "Searches for a query"
        }
        fn get_definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "search".into(),
                description: "Searches for a query".into(),
                parameters: vec![("q".into(), ParameterSchema::new(ParamType::String, "query"))],
                required: vec!["q".into()],
            }
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            args: HashMap<String, Value>,
        ) -> CrateResult<ToolOutput> {
            let q = args.get("q").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(ToolOutput::text(format!("results for {q}")))
        }
    }

    #[tokio::test]
    async fn test_repeated_identical_tool_call_ends_loop_after_three_cycles() {
        let agent = ReActAgent::builder("tester")
            .thought_generator(Arc::new(SameThought))
            .action_selector(Arc::new(AlwaysSearchX))
            .response_generator(Arc::new(DirectResponseGenerator))
            .tool(Arc::new(Search))
            .unwrap()
            .max_iterations(10)
            .build()
            .unwrap();

        let reply = agent.run("session-5", Message::user("look up x")).await.unwrap();
        assert_eq!(
            reply.content,
            "After analyzing the request, I used the search tool and found that the result is: results for x"
        );

        let history = agent.history("session-5").await;
        assert_eq!(history.len(), 3);
    }

    struct FinalAnswerAction;

    #[async_trait]
    impl ActionSelector for FinalAnswerAction {
        async fn select(&self, thought: &Thought, _tools: &ToolSet) -> CrateResult<Vec<Action>> {
            let mut input = serde_json::Map::new();
            input.insert("content".into(), Value::String("the answer is 42".into()));
            Ok(vec![Action::new(thought.id.clone(), "final_answer", input)])
        }
    }

    #[tokio::test]
    async fn test_structured_final_answer_action_terminates_loop() {
        let agent = ReActAgent::builder("tester")
            .thought_generator(Arc::new(SameThought))
            .action_selector(Arc::new(FinalAnswerAction))
            .response_generator(Arc::new(DirectResponseGenerator))
            .max_iterations(3)
            .build()
            .unwrap();

        let reply = agent.run("session-6", Message::user("what is it?")).await.unwrap();
        assert_eq!(reply.content, "the answer is 42");

        let history = agent.history("session-6").await;
        assert_eq!(history.len(), 1);
        assert!(!history[0].observations[0].is_error);
    }

    struct NeverDone;

    #[async_trait]
    impl Model for NeverDone {
        async fn generate(&self, _prompt: &str, _opts: &ModelOptions) -> CrateResult<ModelResponse> {
            Ok(ModelResponse::text("I am still thinking about this problem."))
        }
        async fn generate_with_messages(
            &self,
            _messages: &[Message],
            opts: &ModelOptions,
        ) -> CrateResult<ModelResponse> {
            self.generate("", opts).await
        }
    }

    #[tokio::test]
    async fn test_max_iterations_forces_canned_response() {
        let model = Arc::new(NeverDone);
        let agent = ReActAgent::builder("tester")
            .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
            .response_generator(Arc::new(DirectResponseGenerator))
            .max_iterations(2)
            .build()
            .unwrap();

        // No tools registered, so no action is ever selected: every cycle ends
        // bare and the iteration cap forces the canned response.
        let reply = agent.run("session-2", Message::user("loop forever")).await.unwrap();
        assert!(!reply.content.is_empty());
    }

    #[tokio::test]
    async fn test_run_async_emits_terminal_message() {
        let model = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let agent = ReActAgent::builder("tester")
            .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
            .response_generator(Arc::new(DirectResponseGenerator))
            .tool(Arc::new(Adder))
            .unwrap()
            .build()
            .unwrap();

        let (mut rx, _handle) = agent.run_async("session-3", Message::user("3 + 4?"));
        let mut last = None;
        while let Some(event) = rx.recv().await {
            assert!(!event.is_terminal() || last.is_none());
            if event.is_terminal() {
                last = Some(event);
            }
        }
        assert!(last.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_run() {
        let model = Arc::new(NeverDone);
        let agent = ReActAgent::builder("tester")
            .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
            .response_generator(Arc::new(DirectResponseGenerator))
            .max_iterations(50)
            .build()
            .unwrap();

        let (mut rx, handle) = agent.run_async("session-4", Message::user("go"));
        handle.cancel();
        let mut saw_error = false;
        while let Some(event) = rx.recv().await {
            if let crate::event::EventData::Error { .. } = event.data {
                saw_error = true;
            }
        }
        assert!(saw_error || handle.is_cancelled());
    }
}
