#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;

use std::collections::HashMap;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use serde_json::json;
use serde_json::Value;
use tokio::fs;

use crate::domain::models::BackendBox;
use crate::domain::models::BinaryContent;
use crate::domain::models::BackendRequest;
use crate::domain::models::FunctionCall;
use crate::domain::models::FunctionReturn;
use crate::domain::models::PromptPart;
use crate::domain::models::ToolError;
use crate::domain::models::ToolRegistry;
use crate::domain::models::Turn;

/// Model round trips allowed for a single run.
pub const MAX_ROUND_TRIPS: usize = 50;

const BASE_PROMPT: &str = "You are an agent responsible for performing Rietveld refinements using \
the topas-academic program. You have access to a tool to write topas .inp files to a run directory, \
and a tool to run the refinement and get the results. You perform Rietveld refinements the way \
human researchers do: looking at an X-ray diffraction pattern, deciding which phases are most likely \
to be present based on the pattern, then trying some basic refinements and looking at the results before \
iterating to get the fit as good as possible.
You can search OPTIMADE databases for candidate crystal structures, which are saved as CIF files.
You can also analyze and understand images that users share with you. Use this to look at images of Rietveld \
refinements and plan your next refinement.
Give a summary of what you've done at the end, telling each refinement you did, explaining any errors you found, \
and explaining why you made changes before the next refinement.";

pub fn system_prompt(example_input: Option<&str>) -> String {
    return match example_input {
        Some(example) => format!(
            "{BASE_PROMPT}\n\nHere is an example of a topas input file for refinement of a sample of NaCoO2: {example}"
        ),
        None => BASE_PROMPT.to_string(),
    };
}

/// Reads the example refinement input embedded in the system prompt. A
/// missing file only drops the example.
pub async fn load_example_input(path: &str) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(text) => return Some(text),
        Err(err) => {
            tracing::warn!(path, err = ?err, "Example refinement input unavailable, omitting from prompt");
            return None;
        }
    }
}

pub struct Agent {
    backend: BackendBox,
    tools: ToolRegistry,
    system_prompt: String,
    max_retries: u64,
}

impl Agent {
    pub fn new(
        backend: BackendBox,
        tools: ToolRegistry,
        system_prompt: &str,
        max_retries: u64,
    ) -> Agent {
        return Agent {
            backend,
            tools,
            system_prompt: system_prompt.to_string(),
            max_retries,
        };
    }

    /// Sends the prompt and runs requested tools until the model answers
    /// with text. Retry budgets are tracked per tool for the whole run.
    pub async fn run(&self, prompt: Vec<PromptPart>) -> Result<String> {
        let prompt = self.resolve_images(prompt).await?;
        let mut request = BackendRequest {
            system_prompt: self.system_prompt.to_string(),
            turns: vec![Turn::User(prompt)],
            tools: self.tools.definitions(),
        };
        let mut retries: HashMap<String, u64> = HashMap::new();

        for round in 0..MAX_ROUND_TRIPS {
            let reply = self.backend.generate(&request).await?;
            if reply.is_final() {
                tracing::debug!(round, "Agent run complete");
                return Ok(reply.text);
            }

            request.turns.push(Turn::Model {
                text: reply.text.to_string(),
                calls: reply.calls.clone(),
            });

            let mut returns = vec![];
            let mut images = vec![];
            for call in reply.calls.iter() {
                let (response, mut call_images) = self.call_tool(call, &mut retries).await?;
                returns.push(FunctionReturn {
                    name: call.name.to_string(),
                    response,
                });
                images.append(&mut call_images);
            }
            request.turns.push(Turn::ToolReturns(returns));

            if !images.is_empty() {
                let mut parts = vec![PromptPart::Text(
                    "Images produced by the previous tool calls:".to_string(),
                )];
                parts.extend(images.into_iter().map(PromptPart::Image));
                request.turns.push(Turn::User(parts));
            }
        }

        bail!(format!(
            "Agent stopped after {MAX_ROUND_TRIPS} model round trips without a final answer"
        ));
    }

    /// Downloads linked images once so every round trip reuses the same
    /// inline data.
    async fn resolve_images(&self, prompt: Vec<PromptPart>) -> Result<Vec<PromptPart>> {
        let mut parts = vec![];
        for part in prompt {
            match part {
                PromptPart::ImageUrl(image_url) => {
                    let image = self.backend.fetch_image(&image_url).await?;
                    parts.push(PromptPart::Image(image));
                }
                other => parts.push(other),
            }
        }

        return Ok(parts);
    }

    async fn call_tool(
        &self,
        call: &FunctionCall,
        retries: &mut HashMap<String, u64>,
    ) -> Result<(Value, Vec<BinaryContent>)> {
        tracing::info!(tool = %call.name, args = %call.args, "Calling tool");

        let res = match self.tools.get(&call.name) {
            Some(tool) => tool.call(call.args.clone()).await,
            None => Err(ToolError::retry(format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                self.tools.names().join(", ")
            ))),
        };

        match res {
            Ok(output) => return Ok((output.value, output.images)),
            Err(ToolError::Retry(message)) => {
                let count = retries.entry(call.name.to_string()).or_insert(0);
                *count += 1;
                tracing::warn!(
                    tool = %call.name,
                    attempt = *count,
                    reason = %message,
                    "Tool asked for a retry"
                );
                if *count > self.max_retries {
                    bail!(format!(
                        "Tool '{}' exceeded max retries count of {}: {message}",
                        call.name, self.max_retries
                    ));
                }

                return Ok((json!({ "error": message, "retry": true }), vec![]));
            }
            Err(ToolError::Fatal(err)) => {
                return Err(err).with_context(|| return format!("Tool '{}' failed", call.name));
            }
        }
    }
}
