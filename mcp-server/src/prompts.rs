//! Prompt templates with typed arguments.

use crate::arena::Arena;
use crate::errors::McpError;
use crate::errors::RegistryError;
use mcp_types::GetPromptResult;
use mcp_types::Prompt;
use mcp_types::PromptMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use tracing::warn;

/// Expands a prompt template into its messages.
pub type PromptHandler =
    Box<dyn Fn(&mut Arena, Value) -> Result<Vec<PromptMessage>, McpError> + Send + Sync>;

struct RegisteredPrompt {
    descriptor: Prompt,
    handler: Arc<PromptHandler>,
}

#[derive(Default)]
struct PromptState {
    prompts: Vec<RegisteredPrompt>,
    index: HashMap<String, usize>,
}

#[derive(Default)]
pub struct PromptRegistry {
    state: RwLock<PromptState>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, prompt: Prompt, handler: PromptHandler) -> Result<(), RegistryError> {
        let mut state = self.write_state();
        if state.index.contains_key(&prompt.name) {
            return Err(RegistryError::DuplicateName(prompt.name));
        }
        let slot = state.prompts.len();
        state.index.insert(prompt.name.clone(), slot);
        state.prompts.push(RegisteredPrompt {
            descriptor: prompt,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn list(&self) -> Vec<Prompt> {
        self.read_state()
            .prompts
            .iter()
            .map(|prompt| prompt.descriptor.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.read_state().prompts.len()
    }

    /// Expands `name` with `arguments`. Every argument declared
    /// `required` must be present; unknown keys are accepted with a
    /// warning so newer clients keep working against older templates.
    pub fn get(
        &self,
        arena: &mut Arena,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<GetPromptResult, McpError> {
        let (descriptor, handler) = {
            let state = self.read_state();
            let Some(&slot) = state.index.get(name) else {
                return Err(McpError::invalid_params(format!("unknown prompt: {name}")));
            };
            let prompt = &state.prompts[slot];
            (prompt.descriptor.clone(), Arc::clone(&prompt.handler))
        };

        let arguments = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let Some(supplied) = arguments.as_object() else {
            return Err(McpError::invalid_params("arguments must be an object"));
        };

        for argument in &descriptor.arguments {
            if argument.required == Some(true) && !supplied.contains_key(&argument.name) {
                return Err(McpError::invalid_params(format!(
                    "missing required argument: {}",
                    argument.name
                )));
            }
        }
        for key in supplied.keys() {
            if !descriptor.arguments.iter().any(|argument| argument.name == *key) {
                warn!(prompt = name, argument = %key, "ignoring unknown prompt argument");
            }
        }

        let messages = (*handler)(arena, arguments)?;
        Ok(GetPromptResult {
            description: descriptor.description,
            messages,
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, PromptState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, PromptState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
