//! Drive an agent with `run_async` and print each streamed event as it
//! arrives, cancelling early if the run takes more than a few iterations.
//!
//! Requires a local OpenAI-compatible server at `OPENAI_BASE_URL`.

use react_agent::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let base_url =
        std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "http://localhost:1234/v1".into());
    let model_name = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "qwen2.5-32b-instruct".into());
    let model = Arc::new(OpenAiCompatibleModel::new(base_url, model_name));

    let agent = Arc::new(
        ReActAgent::builder("streaming-bot")
            .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
            .response_generator(Arc::new(DirectResponseGenerator))
            .build()?,
    );

    let (mut events, handle) = agent
        .run_async("demo-session", Message::user("What's the capital of France?"))
        .await;

    while let Some(event) = events.recv().await {
        match &event.data {
            EventData::Thinking { content } => println!("[thinking] {content}"),
            EventData::Tool { tool_name, input } => println!("[tool] {tool_name}({input})"),
            EventData::Observation { content } => println!("[observation] {content}"),
            EventData::Message { message } => println!("[final] {}", message.content),
            EventData::Error { error, error_code } => {
                println!("[error {error_code}] {error}");
                handle.cancel();
            }
            _ => {}
        }
        if event.is_terminal() {
            break;
        }
    }

    Ok(())
}
