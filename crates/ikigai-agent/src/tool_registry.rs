//! Tool discovery and pre-spawn argument validation (spec §6 "Tool
//! subprocess protocol"). Generalizes the teacher's `Tool`/`ParamExt`
//! in-process trait to a registry of subprocess binaries: each tool is a
//! standalone executable, registered by invoking it with `--schema`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;

use crate::error::{AgentError, Result};

/// One registered tool: its wire definition plus the path to its binary.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub path: PathBuf,
}

impl ToolSpec {
    pub fn to_tool_definition(&self) -> ikigai_types::ToolDefinition {
        ikigai_types::ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            strict: false,
        }
    }
}

/// Read-only after init (spec §5 "Shared resources").
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool binary by invoking it with `--schema` and parsing
    /// the schema JSON it prints on stdout.
    pub async fn register(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let output = Command::new(&path)
            .arg("--schema")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(AgentError::tool(format!(
                "{}: --schema exited with {}",
                path.display(),
                output.status
            )));
        }

        let schema: Value = serde_json::from_slice(&output.stdout)?;
        let name = schema
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::tool(format!("{}: schema missing 'name'", path.display())))?
            .to_string();
        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let parameters = schema
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        self.tools.insert(
            name.clone(),
            ToolSpec {
                name,
                description,
                parameters,
                path,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn to_tool_definitions(&self) -> Vec<ikigai_types::ToolDefinition> {
        self.tools.values().map(ToolSpec::to_tool_definition).collect()
    }

    /// Validate a tool call's arguments against the tool's declared JSON
    /// Schema before spawning it, so malformed calls fail fast without
    /// paying for a subprocess.
    pub fn validate_arguments(&self, name: &str, arguments: &Value) -> Result<()> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        validate_against_schema(&tool.parameters, arguments)
            .map_err(|e| AgentError::InvalidToolParams(format!("{name}: {e}")))
    }
}

fn validate_against_schema(schema: &Value, arguments: &Value) -> std::result::Result<(), String> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let properties = schema.get("properties").and_then(Value::as_object);

    for name in required {
        let Some(name) = name.as_str() else { continue };
        let value = arguments
            .required_field(name)
            .map_err(|_| format!("missing required parameter '{name}'"))?;

        let expected_type = properties
            .and_then(|p| p.get(name))
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str);
        if let Some(expected_type) = expected_type {
            if !matches_json_type(value, expected_type) {
                return Err(format!(
                    "'{name}' has the wrong type: expected {expected_type}"
                ));
            }
        }
    }
    Ok(())
}

fn matches_json_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Minimal parameter-extraction helper, in the spirit of the teacher's
/// `ParamExt` trait, scoped to what pre-spawn schema validation needs.
trait ParamExt {
    fn required_field(&self, name: &str) -> std::result::Result<&Value, ()>;
}

impl ParamExt for Value {
    fn required_field(&self, name: &str) -> std::result::Result<&Value, ()> {
        self.get(name).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_against_schema_rejects_missing_required_field() {
        let schema = json!({"required": ["pattern"], "properties": {"pattern": {"type": "string"}}});
        let err = validate_against_schema(&schema, &json!({})).unwrap_err();
        assert!(err.contains("pattern"));
    }

    #[test]
    fn validate_against_schema_rejects_wrong_type() {
        let schema = json!({"required": ["count"], "properties": {"count": {"type": "integer"}}});
        let err = validate_against_schema(&schema, &json!({"count": "five"})).unwrap_err();
        assert!(err.contains("count"));
    }

    #[test]
    fn validate_against_schema_accepts_valid_arguments() {
        let schema = json!({"required": ["pattern"], "properties": {"pattern": {"type": "string"}}});
        assert!(validate_against_schema(&schema, &json!({"pattern": "*.rs"})).is_ok());
    }

    #[test]
    fn validate_against_schema_with_no_required_array_accepts_anything() {
        let schema = json!({});
        assert!(validate_against_schema(&schema, &json!({"anything": 1})).is_ok());
    }
}
