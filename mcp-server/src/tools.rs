//! Tool registration and invocation.
//!
//! The registry is shared across connections behind a read-mostly lock.
//! Lookups clone the handler handle and release the lock before invoking
//! it, so a tool may list or call the registry re-entrantly. Argument
//! validation is shallow on purpose: the top-level `required` list and
//! `type` hints of the input schema are enforced here, anything deeper is
//! the handler's business.

use crate::arena::Arena;
use crate::error_code::is_server_defined;
use crate::errors::McpError;
use crate::errors::RegistryError;
use mcp_types::CallToolResult;
use mcp_types::ContentBlock;
use mcp_types::Tool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

/// A tool implementation. Pure relative to MCP state; may consult
/// external state. Runs to completion on the connection's worker.
pub type ToolHandler =
    Box<dyn Fn(&mut Arena, Value) -> Result<Value, McpError> + Send + Sync>;

struct RegisteredTool {
    descriptor: Tool,
    handler: Arc<ToolHandler>,
}

#[derive(Default)]
struct ToolState {
    /// Insertion order is the listing order.
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

#[derive(Default)]
pub struct ToolRegistry {
    state: RwLock<ToolState>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Tool, handler: ToolHandler) -> Result<(), RegistryError> {
        let mut state = self.write_state();
        if state.index.contains_key(&tool.name) {
            return Err(RegistryError::DuplicateName(tool.name));
        }
        let slot = state.tools.len();
        state.index.insert(tool.name.clone(), slot);
        state.tools.push(RegisteredTool {
            descriptor: tool,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Owned descriptors in registration order.
    pub fn list(&self) -> Vec<Tool> {
        self.read_state()
            .tools
            .iter()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.read_state().tools.len()
    }

    /// Looks up `name`, validates `arguments` against the schema's top
    /// level, and invokes the handler. Domain failures raised by the
    /// handler with a server-defined code come back as `is_error: true`
    /// results; anything else is an internal error.
    pub fn call(
        &self,
        arena: &mut Arena,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, McpError> {
        let (schema, handler) = {
            let state = self.read_state();
            let Some(&slot) = state.index.get(name) else {
                return Err(McpError::invalid_params(format!("unknown tool: {name}")));
            };
            let tool = &state.tools[slot];
            (tool.descriptor.input_schema.clone(), Arc::clone(&tool.handler))
        };

        let arguments = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        validate_arguments(&schema, &arguments)?;

        match (*handler)(arena, arguments) {
            Ok(value) => Ok(CallToolResult {
                content: vec![value_as_content(value)],
                is_error: false,
            }),
            Err(err) if is_server_defined(err.code) => Ok(CallToolResult {
                content: vec![ContentBlock::text(err.message)],
                is_error: true,
            }),
            Err(err) => Err(McpError::internal(format!(
                "tool {name} failed: {}",
                err.message
            ))),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ToolState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ToolState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn value_as_content(value: Value) -> ContentBlock {
    match value {
        Value::String(text) => ContentBlock::text(text),
        other => ContentBlock::text(other.to_string()),
    }
}

/// Shallow validation: top-level `required` membership and `type` hints
/// from `properties`. Deep JSON-Schema validation is delegated to the
/// handler.
fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), McpError> {
    let Some(object) = arguments.as_object() else {
        return Err(McpError::invalid_params("arguments must be an object"));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for entry in required {
            if let Some(key) = entry.as_str()
                && !object.contains_key(key)
            {
                return Err(McpError::invalid_params(format!(
                    "missing required argument: {key}"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, property) in properties {
            let Some(value) = object.get(key) else {
                continue;
            };
            let Some(expected) = property.get("type").and_then(Value::as_str) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(McpError::invalid_params(format!(
                    "argument {key} must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type hints are not enforced here.
        _ => true,
    }
}
