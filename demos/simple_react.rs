//! A minimal ReAct agent with one tool, run to completion without streaming.
//!
//! Requires a local OpenAI-compatible server (LMStudio, Ollama, llama.cpp) at
//! `OPENAI_BASE_URL`, defaulting to `http://localhost:1234/v1`.

use async_trait::async_trait;
use react_agent::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a simple add/sub/mul/div over two numbers"
    }

    fn get_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculator".into(),
            description: self.description().into(),
            parameters: vec![
                ("op".into(), ParameterSchema::new(ParamType::String, "add|sub|mul|div")),
                ("a".into(), ParameterSchema::new(ParamType::Number, "left operand")),
                ("b".into(), ParameterSchema::new(ParamType::Number, "right operand")),
            ],
            required: vec!["op".into(), "a".into(), "b".into()],
        }
    }

    async fn execute(&self, _ctx: &ToolContext, args: HashMap<String, Value>) -> Result<ToolOutput> {
        let op = args.get("op").and_then(Value::as_str).unwrap_or("add");
        let a = args.get("a").and_then(Value::as_f64).unwrap_or(0.0);
        let b = args.get("b").and_then(Value::as_f64).unwrap_or(0.0);
        let result = match op {
            "add" => a + b,
            "sub" => a - b,
            "mul" => a * b,
            "div" if b != 0.0 => a / b,
            "div" => return Err(Error::Tool("division by zero".into())),
            other => return Err(Error::Tool(format!("unknown op: {other}"))),
        };
        Ok(ToolOutput::text(result.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let base_url =
        std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "http://localhost:1234/v1".into());
    let model_name = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "qwen2.5-32b-instruct".into());
    let model = Arc::new(OpenAiCompatibleModel::new(base_url, model_name));

    let agent = ReActAgent::builder("calculator-bot")
        .thought_generator(Arc::new(DefaultThoughtGenerator::new(model)))
        .response_generator(Arc::new(DirectResponseGenerator))
        .tool(Arc::new(Calculator))?
        .build()?;

    let reply = agent
        .run("demo-session", Message::user("What's 17 times 6?"))
        .await?;
    println!("{}", reply.content);
    Ok(())
}
