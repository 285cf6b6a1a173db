#[cfg(test)]
#[path = "tool_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::BinaryContent;

/// Failure of a tool call, split by what the agent should do about it.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The model should fix its call and try again. The message is sent back
    /// to the model as guidance.
    #[error("{0}")]
    Retry(String),
    /// The run cannot continue.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn retry(message: impl Into<String>) -> ToolError {
        return ToolError::Retry(message.into());
    }

    pub fn is_retry(&self) -> bool {
        return matches!(self, ToolError::Retry(_));
    }
}

/// Declaration of a tool as presented to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of a successful tool call. Images are shown to the model alongside
/// the JSON value.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    pub value: Value,
    pub images: Vec<BinaryContent>,
}

impl ToolOutput {
    pub fn new(value: Value) -> ToolOutput {
        return ToolOutput {
            value,
            images: vec![],
        };
    }

    pub fn with_image(mut self, image: Option<BinaryContent>) -> ToolOutput {
        if let Some(image) = image {
            self.images.push(image);
        }

        return self;
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Description given to the model, including any calling conventions it
    /// must follow.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// Tools available to an agent, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> ToolRegistry {
        return ToolRegistry::default();
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        return self.tools.get(name).cloned();
    }

    pub fn names(&self) -> Vec<String> {
        return self.tools.keys().cloned().collect();
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        return self
            .tools
            .values()
            .map(|tool| {
                return ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters(),
                };
            })
            .collect();
    }
}
