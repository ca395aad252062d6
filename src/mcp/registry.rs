//! Tool declarations, argument validation, and guarded dispatch.
//!
//! Every tool declares its parameters once. The same declaration produces
//! the JSON Schema advertised by `tools/list` and drives the checks run
//! before a handler is invoked, so a handler only ever sees arguments whose
//! required fields are present and whose types are correct.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::mcp::context::ServerContext;

/// Type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any string.
    String,
    /// Non-negative integer no smaller than `min`.
    Integer {
        /// Smallest accepted value.
        min: u64,
    },
    /// `true` or `false`.
    Boolean,
    /// Array of strings.
    StringArray,
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
}

impl ParamKind {
    fn schema(self, description: &str) -> Value {
        match self {
            Self::String => json!({ "type": "string", "description": description }),
            Self::Integer { min } => {
                json!({ "type": "integer", "minimum": min, "description": description })
            }
            Self::Boolean => json!({ "type": "boolean", "description": description }),
            Self::StringArray => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": description,
            }),
            Self::Enum(values) => {
                json!({ "type": "string", "enum": values, "description": description })
            }
        }
    }

    fn check(self, value: &Value) -> Result<(), String> {
        match self {
            Self::String => value
                .is_string()
                .then_some(())
                .ok_or_else(|| "expected a string".to_string()),
            Self::Integer { min } => match value.as_u64() {
                Some(n) if n >= min => Ok(()),
                Some(_) => Err(format!("must be at least {min}")),
                None => Err("expected a non-negative integer".to_string()),
            },
            Self::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| "expected a boolean".to_string()),
            Self::StringArray => match value.as_array() {
                Some(items) if items.iter().all(Value::is_string) => Ok(()),
                Some(_) => Err("expected every item to be a string".to_string()),
                None => Err("expected an array of strings".to_string()),
            },
            Self::Enum(values) => match value.as_str() {
                Some(s) if values.contains(&s) => Ok(()),
                _ => Err(format!("expected one of: {}", values.join(", "))),
            },
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Argument name.
    pub name: &'static str,
    /// Accepted type.
    pub kind: ParamKind,
    /// Whether the argument must be present.
    pub required: bool,
    /// Human-readable description.
    pub description: &'static str,
}

impl ParamSpec {
    /// A required parameter.
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    /// An optional parameter.
    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Handler signature shared by every tool.
pub type ToolHandler = fn(&mut ServerContext, &Value) -> Result<Value, ToolError>;

/// A declared tool.
pub struct Tool {
    /// Unique tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Declared parameters.
    pub params: Vec<ParamSpec>,
    handler: ToolHandler,
}

impl Tool {
    /// Declares a tool.
    #[must_use]
    pub fn new(
        name: &'static str,
        description: &'static str,
        params: Vec<ParamSpec>,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name,
            description,
            params,
            handler,
        }
    }

    /// The `tools/list` entry for this tool.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.kind.schema(p.description)))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        ToolDefinition {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Checks `arguments` against the declared parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Validation`] naming the first offending parameter.
    pub fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let empty = Map::new();
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ToolError::validation("arguments", "expected an object")),
        };

        for param in &self.params {
            match args.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::validation(
                        param.name,
                        "missing required parameter",
                    ));
                }
                None | Some(Value::Null) => {}
                Some(value) => param
                    .kind
                    .check(value)
                    .map_err(|message| ToolError::validation(param.name, message))?,
            }
        }

        for name in args.keys() {
            if !self.params.iter().any(|p| p.name == name) {
                tracing::debug!(tool = self.name, argument = %name, "Ignoring undeclared argument");
            }
        }

        Ok(())
    }
}

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// The set of tools a server exposes.
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    /// Creates a registry from declared tools.
    #[must_use]
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Definitions of every tool, in declaration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Validates and runs a tool.
    ///
    /// A panicking handler is reported as [`ToolError::Internal`]; the
    /// registry and context stay usable afterwards.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown tool or bad arguments, or
    /// whatever error the handler produced.
    pub fn call(
        &self,
        context: &mut ServerContext,
        name: &str,
        arguments: &Value,
    ) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::validation("name", format!("Unknown tool: {name}")))?;

        tool.validate(arguments)?;

        let handler = tool.handler;
        panic::catch_unwind(AssertUnwindSafe(|| handler(context, arguments))).unwrap_or_else(
            |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(tool = name, panic = %message, "Tool handler panicked");
                Err(ToolError::Internal {
                    message: format!("tool '{name}' failed unexpectedly: {message}"),
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn echo(_: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
        Ok(args.clone())
    }

    fn explode(_: &mut ServerContext, _: &Value) -> Result<Value, ToolError> {
        panic!("boom");
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![
            Tool::new(
                "echo",
                "Echo arguments",
                vec![
                    ParamSpec::required("directory", ParamKind::String, "Dir"),
                    ParamSpec::optional("batch_size", ParamKind::Integer { min: 1 }, "Size"),
                    ParamSpec::optional("order", ParamKind::Enum(&["asc", "desc"]), "Order"),
                    ParamSpec::optional("extensions", ParamKind::StringArray, "Exts"),
                ],
                echo,
            ),
            Tool::new("explode", "Always panics", Vec::new(), explode),
        ])
    }

    fn context() -> ServerContext {
        ServerContext::new(&Config::default())
    }

    fn validation_param(result: Result<Value, ToolError>) -> String {
        match result {
            Err(ToolError::Validation { param, .. }) => param,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn schema_lists_required_parameters() {
        let defs = registry().definitions();
        let schema = &defs[0].input_schema;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["directory"]));
        assert_eq!(schema["properties"]["batch_size"]["minimum"], 1);
        assert_eq!(schema["properties"]["order"]["enum"], json!(["asc", "desc"]));
    }

    #[test]
    fn missing_required_parameter() {
        let mut ctx = context();
        let result = registry().call(&mut ctx, "echo", &json!({}));
        assert_eq!(validation_param(result), "directory");
    }

    #[test]
    fn mistyped_parameters() {
        let registry = registry();
        let mut ctx = context();

        let cases = [
            (json!({ "directory": 5 }), "directory"),
            (json!({ "directory": "/", "batch_size": 0 }), "batch_size"),
            (json!({ "directory": "/", "batch_size": -3 }), "batch_size"),
            (json!({ "directory": "/", "batch_size": "10" }), "batch_size"),
            (json!({ "directory": "/", "order": "sideways" }), "order"),
            (json!({ "directory": "/", "extensions": ["rs", 1] }), "extensions"),
        ];
        for (args, param) in cases {
            assert_eq!(validation_param(registry.call(&mut ctx, "echo", &args)), param);
        }
    }

    #[test]
    fn unknown_tool_is_a_validation_error() {
        let mut ctx = context();
        let result = registry().call(&mut ctx, "nope", &json!({}));
        assert_eq!(validation_param(result), "name");
    }

    #[test]
    fn valid_arguments_reach_handler() {
        let mut ctx = context();
        let args = json!({ "directory": "/tmp", "batch_size": 10, "order": "desc" });
        let result = registry().call(&mut ctx, "echo", &args).unwrap();
        assert_eq!(result, args);
    }

    #[test]
    fn panicking_handler_becomes_internal_error() {
        let registry = registry();
        let mut ctx = context();
        for _ in 0..3 {
            let err = registry.call(&mut ctx, "explode", &Value::Null).unwrap_err();
            assert_eq!(err.kind(), "internal_error");
            assert!(err.to_string().contains("boom"));
        }
        assert!(registry
            .call(&mut ctx, "echo", &json!({ "directory": "/" }))
            .is_ok());
    }
}
