//! Fan a question out to two differently-tempered agents in parallel, then
//! pipe a drafting agent's answer through an editing agent in sequence.
//!
//! Requires a local OpenAI-compatible server at `OPENAI_BASE_URL`.

use react_agent::prelude::*;
use std::sync::Arc;

fn build_agent(name: &str, system_hint: &str) -> Arc<ReActAgent> {
    let base_url =
        std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "http://localhost:1234/v1".into());
    let model_name = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "qwen2.5-32b-instruct".into());
    let model = Arc::new(OpenAiCompatibleModel::new(base_url, model_name));

    Arc::new(
        ReActAgent::builder(name)
            .description(system_hint)
            .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
            .response_generator(Arc::new(DirectResponseGenerator))
            .build()
            .unwrap(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let panel = ParallelAgent::new(
        "panel",
        vec![
            build_agent("optimist", "Answer with an optimistic outlook") as Arc<dyn Agent>,
            build_agent("skeptic", "Answer with a skeptical outlook") as Arc<dyn Agent>,
        ],
    );
    let reply = panel
        .run("demo-session", Message::user("Will this project ship on time?"))
        .await?;
    println!("--- panel ---\n{}", reply.content);

    let pipeline = SequentialAgent::new(
        "draft-then-edit",
        vec![
            build_agent("drafter", "Draft a one-paragraph announcement") as Arc<dyn Agent>,
            build_agent("editor", "Tighten the given draft to two sentences") as Arc<dyn Agent>,
        ],
    );
    let reply = pipeline
        .run("demo-session", Message::user("Announce the 2.0 release"))
        .await?;
    println!("--- pipeline ---\n{}", reply.content);

    Ok(())
}
