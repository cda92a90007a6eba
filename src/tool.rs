//! # Tool Abstraction
//!
//! A uniform contract for callable capabilities, their JSON-schema-like
//! parameter declarations, and deterministic argument coercion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Declared type of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

/// Schema for a single named parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub param_type: ParamType,
    pub description: String,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            default: None,
            enum_values: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Canonical, order-preserving description of a tool's callable surface.
///
/// `name` is globally unique within a [`ToolSet`]. `parameters` preserves
/// declaration order, which the action parser relies on for primary-parameter
/// inference (the first required string parameter, else the first string
/// parameter, else the first parameter, else `"input"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<(String, ParameterSchema)>,
    pub required: Vec<String>,
}

impl ToolDefinition {
    /// The parameter bare-string input should bind to, per the primary-parameter rule.
    pub fn primary_parameter(&self) -> String {
        if let Some(name) = self.required.iter().find(|r| {
            self.parameters
                .iter()
                .any(|(n, s)| n == *r && s.param_type == ParamType::String)
        }) {
            return name.clone();
        }
        if let Some((name, _)) = self
            .parameters
            .iter()
            .find(|(_, s)| s.param_type == ParamType::String)
        {
            return name.clone();
        }
        if let Some((name, _)) = self.parameters.first() {
            return name.clone();
        }
        "input".to_string()
    }

    /// Render as a JSON-schema-shaped object, the form a tool-call-capable
    /// model expects in its function declarations.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for (name, schema) in &self.parameters {
            let mut prop = serde_json::Map::new();
            let type_str = match schema.param_type {
                ParamType::String => "string",
                ParamType::Number => "number",
                ParamType::Integer => "integer",
                ParamType::Boolean => "boolean",
                ParamType::Object => "object",
                ParamType::Array => "array",
            };
            prop.insert("type".into(), Value::String(type_str.into()));
            prop.insert(
                "description".into(),
                Value::String(schema.description.clone()),
            );
            if let Some(default) = &schema.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(enum_values) = &schema.enum_values {
                prop.insert("enum".into(), Value::Array(enum_values.clone()));
            }
            properties.insert(name.clone(), Value::Object(prop));
        }
        serde_json::json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": self.required,
        })
    }
}

/// The result of a successful tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub output: Value,
    pub metadata: HashMap<String, String>,
}

impl ToolOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: Value::String(output.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn json(output: Value) -> Self {
        Self {
            output,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Ambient context passed to a tool at execution time. Tools may cooperatively
/// check `is_cancelled` on long-running work; the engine does not forcibly
/// abort an in-flight tool call.
#[derive(Clone, Default)]
pub struct ToolContext {
    cancelled: Option<tokio::sync::watch::Receiver<bool>>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancelled: tokio::sync::watch::Receiver<bool>) -> Self {
        Self {
            cancelled: Some(cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().map(|c| *c.borrow()).unwrap_or(false)
    }
}

/// A callable capability bound to a [`ToolDefinition`].
///
/// Execution is a function of `(context, arguments)`; implementations may be
/// non-pure (network calls, filesystem access) but must be re-entrant — the
/// engine never serializes calls to a single tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn get_definition(&self) -> ToolDefinition;

    async fn execute(&self, ctx: &ToolContext, args: HashMap<String, Value>) -> Result<ToolOutput>;
}

/// A mapping from tool name to callable, with duplicate registration rejected.
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if a tool with the same name is already present.
    pub fn add(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::config(format!("duplicate tool name: {name}")));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.get_definition()).collect()
    }
}

/// Cast a raw JSON argument map against a tool's declared schema.
///
/// Deterministic rules:
/// - a value already matching the declared type passes through unchanged;
/// - a string value is parsed into the declared scalar type where possible
///   (`"3"` → `3` for `Number`/`Integer`, `"true"` → `true` for `Boolean`);
/// - a string expected to be `Object`/`Array` is parsed as JSON;
/// - fields absent from the schema are left unchanged (never rejected);
/// - missing optional fields never raise; missing required fields raise
///   [`Error::MissingRequired`] *after* coercion, so the caller sees one error
///   per call rather than per field.
pub fn coerce_arguments(
    def: &ToolDefinition,
    raw: HashMap<String, Value>,
) -> Result<HashMap<String, Value>> {
    let mut coerced = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let Some((_, schema)) = def.parameters.iter().find(|(n, _)| *n == key) else {
            coerced.insert(key, value);
            continue;
        };
        coerced.insert(key.clone(), coerce_value(&key, value, schema.param_type)?);
    }

    for required in &def.required {
        if !coerced.contains_key(required) {
            if let Some(default) = def
                .parameters
                .iter()
                .find(|(n, _)| n == required)
                .and_then(|(_, s)| s.default.clone())
            {
                coerced.insert(required.clone(), default);
                continue;
            }
            return Err(Error::MissingRequired(required.clone()));
        }
    }

    Ok(coerced)
}

fn coerce_value(key: &str, value: Value, param_type: ParamType) -> Result<Value> {
    match (param_type, &value) {
        (ParamType::String, Value::String(_)) => Ok(value),
        (ParamType::String, _) => Ok(Value::String(value.to_string())),

        (ParamType::Number, Value::Number(_)) => Ok(value),
        (ParamType::Number, Value::String(s)) => s
            .parse::<f64>()
            .map(|n| serde_json::json!(n))
            .map_err(|_| Error::ArgumentParse(format!("{key}: {s:?} is not a number"))),

        (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value),
        (ParamType::Integer, Value::Number(n)) => Err(Error::ArgumentParse(format!(
            "{key}: {n} is not an integer"
        ))),
        (ParamType::Integer, Value::String(s)) => s
            .parse::<i64>()
            .map(|n| serde_json::json!(n))
            .map_err(|_| Error::ArgumentParse(format!("{key}: {s:?} is not an integer"))),

        (ParamType::Boolean, Value::Bool(_)) => Ok(value),
        (ParamType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(Error::ArgumentParse(format!(
                "{key}: {s:?} is not a boolean"
            ))),
        },

        (ParamType::Object, Value::Object(_)) => Ok(value),
        (ParamType::Object, Value::String(s)) => serde_json::from_str(s)
            .map_err(|e| Error::ArgumentParse(format!("{key}: invalid object JSON: {e}"))),

        (ParamType::Array, Value::Array(_)) => Ok(value),
        (ParamType::Array, Value::String(s)) => serde_json::from_str(s)
            .map_err(|e| Error::ArgumentParse(format!("{key}: invalid array JSON: {e}"))),

        _ => Err(Error::ArgumentParse(format!(
            "{key}: value {value} is not compatible with {param_type:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn get_definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes input".into(),
                parameters: vec![(
                    "text".into(),
                    ParameterSchema::new(ParamType::String, "text to echo"),
                )],
                required: vec!["text".into()],
            }
        }
        async fn execute(&self, _ctx: &ToolContext, args: HashMap<String, Value>) -> Result<ToolOutput> {
            Ok(ToolOutput::json(args.get("text").cloned().unwrap_or(Value::Null)))
        }
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut set = ToolSet::new();
        set.add(Arc::new(Echo)).unwrap();
        assert!(set.add(Arc::new(Echo)).is_err());
    }

    #[test]
    fn test_primary_parameter_required_string() {
        let def = Echo.get_definition();
        assert_eq!(def.primary_parameter(), "text");
    }

    #[test]
    fn test_primary_parameter_fallback_to_input() {
        let def = ToolDefinition {
            name: "noop".into(),
            description: "".into(),
            parameters: vec![],
            required: vec![],
        };
        assert_eq!(def.primary_parameter(), "input");
    }

    #[test]
    fn test_coerce_numeric_string() {
        let def = ToolDefinition {
            name: "add".into(),
            description: "".into(),
            parameters: vec![
                ("a".into(), ParameterSchema::new(ParamType::Number, "")),
                ("b".into(), ParameterSchema::new(ParamType::Integer, "")),
            ],
            required: vec!["a".into(), "b".into()],
        };
        let raw = HashMap::from([
            ("a".to_string(), Value::String("2.5".into())),
            ("b".to_string(), Value::String("3".into())),
        ]);
        let coerced = coerce_arguments(&def, raw).unwrap();
        assert_eq!(coerced["a"], serde_json::json!(2.5));
        assert_eq!(coerced["b"], serde_json::json!(3));
    }

    #[test]
    fn test_coerce_rejects_incompatible_number() {
        let def = ToolDefinition {
            name: "add".into(),
            description: "".into(),
            parameters: vec![("a".into(), ParameterSchema::new(ParamType::Number, ""))],
            required: vec!["a".into()],
        };
        let raw = HashMap::from([("a".to_string(), Value::String("abc".into()))]);
        assert!(matches!(
            coerce_arguments(&def, raw),
            Err(Error::ArgumentParse(_))
        ));
    }

    #[test]
    fn test_coerce_missing_required() {
        let def = ToolDefinition {
            name: "add".into(),
            description: "".into(),
            parameters: vec![("a".into(), ParameterSchema::new(ParamType::Number, ""))],
            required: vec!["a".into()],
        };
        assert!(matches!(
            coerce_arguments(&def, HashMap::new()),
            Err(Error::MissingRequired(_))
        ));
    }

    #[test]
    fn test_coerce_unknown_field_passthrough() {
        let def = ToolDefinition {
            name: "noop".into(),
            description: "".into(),
            parameters: vec![],
            required: vec![],
        };
        let raw = HashMap::from([("extra".to_string(), Value::Bool(true))]);
        let coerced = coerce_arguments(&def, raw).unwrap();
        assert_eq!(coerced["extra"], Value::Bool(true));
    }

    #[test]
    fn test_coerce_missing_required_uses_default() {
        let def = ToolDefinition {
            name: "greet".into(),
            description: "".into(),
            parameters: vec![(
                "name".into(),
                ParameterSchema::new(ParamType::String, "").with_default(Value::String("world".into())),
            )],
            required: vec!["name".into()],
        };
        let coerced = coerce_arguments(&def, HashMap::new()).unwrap();
        assert_eq!(coerced["name"], Value::String("world".into()));
    }

    #[tokio::test]
    async fn test_echo_execute() {
        let out = Echo
            .execute(
                &ToolContext::new(),
                HashMap::from([("text".to_string(), Value::String("hi".into()))]),
            )
            .await
            .unwrap();
        assert_eq!(out.output, Value::String("hi".into()));
    }
}
