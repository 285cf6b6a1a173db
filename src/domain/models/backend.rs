#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::BinaryContent;
use super::ImageUrl;
use super::ToolDefinition;

/// One piece of a user turn.
#[derive(Clone, Debug, PartialEq)]
pub enum PromptPart {
    Text(String),
    Image(BinaryContent),
    ImageUrl(ImageUrl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionReturn {
    pub name: String,
    pub response: Value,
}

/// A turn of the exchange between the agent and the model.
#[derive(Clone, Debug, PartialEq)]
pub enum Turn {
    User(Vec<PromptPart>),
    Model {
        text: String,
        calls: Vec<FunctionCall>,
    },
    ToolReturns(Vec<FunctionReturn>),
}

pub struct BackendRequest {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendReply {
    pub text: String,
    pub calls: Vec<FunctionCall>,
}

impl BackendReply {
    pub fn is_final(&self) -> bool {
        return self.calls.is_empty();
    }
}

#[async_trait]
pub trait Backend {
    /// Used at startup to verify the model and credentials are usable.
    async fn health_check(&self) -> Result<()>;

    /// Requests the next model turn for the given exchange. A reply either
    /// carries text for the user or function calls the agent must run.
    async fn generate(&self, request: &BackendRequest) -> Result<BackendReply>;

    /// Downloads a linked image so it can be sent inline. Called once per
    /// agent run for each linked image.
    async fn fetch_image(&self, image_url: &ImageUrl) -> Result<BinaryContent> {
        bail!(format!("Cannot download image {}", image_url.url));
    }
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
