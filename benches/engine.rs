use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, Criterion};
use react_agent::{
    DefaultThoughtGenerator, DirectResponseGenerator, Message, Model, ModelOptions,
    ModelResponse, ReActAgent, Result,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

struct OneShotModel;

#[async_trait]
impl Model for OneShotModel {
    async fn generate(&self, _prompt: &str, _opts: &ModelOptions) -> Result<ModelResponse> {
        Ok(ModelResponse::text("Final Answer: done"))
    }

    async fn generate_with_messages(
        &self,
        _messages: &[Message],
        opts: &ModelOptions,
    ) -> Result<ModelResponse> {
        self.generate("", opts).await
    }
}

fn build_agent() -> ReActAgent {
    ReActAgent::builder("bench-agent")
        .thought_generator(Arc::new(DefaultThoughtGenerator::new(Arc::new(OneShotModel))))
        .response_generator(Arc::new(DirectResponseGenerator))
        .build()
        .unwrap()
}

fn bench_single_cycle_run(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let agent = build_agent();
    let mut session = 0u64;

    c.bench_function("react_agent_single_cycle_to_final_answer", |b| {
        b.iter(|| {
            session += 1;
            rt.block_on(async {
                agent
                    .run(&format!("bench-{session}"), Message::user("what's 2+2?"))
                    .await
                    .unwrap()
            })
        })
    });
}

/// Same session reused across iterations: cycle history keeps growing, so
/// this also exercises thought-generation cost as prior-cycle rendering
/// accumulates.
fn bench_growing_session_history(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let agent = build_agent();

    c.bench_function("react_agent_growing_session_history", |b| {
        b.iter(|| {
            rt.block_on(async {
                agent
                    .run("bench-shared-session", Message::user("what's 2+2?"))
                    .await
                    .unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_single_cycle_run, bench_growing_session_history);
criterion_main!(benches);
