#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;

use std::path;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendReply;
use crate::domain::models::BackendRequest;
use crate::domain::models::BinaryContent;
use crate::domain::models::FunctionCall;
use crate::domain::models::ImageUrl;
use crate::domain::models::PromptPart;
use crate::domain::models::ToolDefinition;
use crate::domain::models::Turn;
use crate::domain::services::media_type;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionResponsePart {
    name: String,
    response: Value,
}

// Gemini parts carry exactly one of these fields, but replies may add extra
// metadata keys next to them.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePart>,
}

impl Part {
    fn text(text: &str) -> Part {
        return Part {
            text: Some(text.to_string()),
            ..Default::default()
        };
    }

    fn inline(content: &BinaryContent) -> Part {
        return Part {
            inline_data: Some(Blob {
                mime_type: content.media_type.to_string(),
                data: content.base64(),
            }),
            ..Default::default()
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

// Function responses must be JSON objects.
fn as_object(value: &Value) -> Value {
    if value.is_object() {
        return value.clone();
    }

    return json!({ "result": value });
}

fn to_declarations(tools: &[ToolDefinition]) -> Vec<ToolDeclarations> {
    if tools.is_empty() {
        return vec![];
    }

    return vec![ToolDeclarations {
        function_declarations: tools
            .iter()
            .map(|tool| {
                return FunctionDeclaration {
                    name: tool.name.to_string(),
                    description: tool.description.to_string(),
                    parameters: tool.parameters.clone(),
                };
            })
            .collect(),
    }];
}

pub struct Gemini {
    url: String,
    token: String,
    model: String,
}

impl Default for Gemini {
    fn default() -> Gemini {
        return Gemini {
            url: Config::get(ConfigKey::GeminiURL),
            token: Config::get(ConfigKey::GeminiToken),
            model: Config::get(ConfigKey::Model),
        };
    }
}

impl Gemini {
    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            return self.model.to_string();
        }

        return format!("models/{}", self.model);
    }

    fn to_contents(&self, turns: &[Turn]) -> Result<Vec<Content>> {
        let mut contents = vec![];
        for turn in turns {
            let content = match turn {
                Turn::User(prompt_parts) => {
                    let mut parts = vec![];
                    for part in prompt_parts {
                        match part {
                            PromptPart::Text(text) => parts.push(Part::text(text)),
                            PromptPart::Image(image) => parts.push(Part::inline(image)),
                            PromptPart::ImageUrl(image_url) => {
                                bail!(format!(
                                    "Image {} must be downloaded before it is sent",
                                    image_url.url
                                ));
                            }
                        }
                    }

                    Content {
                        role: "user".to_string(),
                        parts,
                    }
                }
                Turn::Model { text, calls } => {
                    let mut parts = vec![];
                    if !text.is_empty() {
                        parts.push(Part::text(text));
                    }
                    for call in calls {
                        parts.push(Part {
                            function_call: Some(FunctionCallPart {
                                name: call.name.to_string(),
                                args: call.args.clone(),
                            }),
                            ..Default::default()
                        });
                    }

                    Content {
                        role: "model".to_string(),
                        parts,
                    }
                }
                Turn::ToolReturns(returns) => Content {
                    role: "user".to_string(),
                    parts: returns
                        .iter()
                        .map(|ret| {
                            return Part {
                                function_response: Some(FunctionResponsePart {
                                    name: ret.name.to_string(),
                                    response: as_object(&ret.response),
                                }),
                                ..Default::default()
                            };
                        })
                        .collect(),
                },
            };
            contents.push(content);
        }

        return Ok(contents);
    }
}

#[async_trait]
impl Backend for Gemini {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Gemini URL is not defined");
        }
        if self.token.is_empty() {
            bail!("GEMINI_API_KEY is not set. Add it to your environment or .env file");
        }

        let url = format!(
            "{url}/v1beta/{model}?key={key}",
            url = self.url,
            model = self.model_path(),
            key = self.token
        );

        let res = reqwest::Client::new()
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await;

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, "Gemini is not reachable");
                bail!("Gemini is not reachable");
            }
        };

        let status = res.status().as_u16();
        if status >= 400 {
            tracing::error!(status = status, "Gemini health check failed");
            bail!(format!("Gemini health check failed for model {}", self.model));
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, request: &BackendRequest) -> Result<BackendReply> {
        let req = GenerateContentRequest {
            system_instruction: Content {
                role: "".to_string(),
                parts: vec![Part::text(&request.system_prompt)],
            },
            contents: self.to_contents(&request.turns)?,
            tools: to_declarations(&request.tools),
        };

        let res = reqwest::Client::new()
            .post(format!(
                "{url}/v1beta/{model}:generateContent?key={key}",
                url = self.url,
                model = self.model_path(),
                key = self.token,
            ))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Failed to make completion request to Gemini");
            bail!(format!(
                "Failed to make completion request to Gemini, {status}"
            ));
        }

        let body = res.json::<GenerateContentResponse>().await?;
        let candidate = match body.candidates.into_iter().next() {
            Some(candidate) => candidate,
            None => bail!("Gemini returned no candidates"),
        };
        tracing::debug!(finish_reason = %candidate.finish_reason, "Gemini reply");

        let mut reply = BackendReply::default();
        let mut texts = vec![];
        for part in candidate.content.parts {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                reply.calls.push(FunctionCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }
        reply.text = texts.join("");

        return Ok(reply);
    }

    #[allow(clippy::implicit_return)]
    async fn fetch_image(&self, image_url: &ImageUrl) -> Result<BinaryContent> {
        let url = &image_url.url;
        let res = reqwest::Client::new()
            .get(url.as_str())
            .send()
            .await
            .with_context(|| return format!("Failed to download image {url}"))?;

        if !res.status().is_success() {
            bail!(format!(
                "Failed to download image {url}, {}",
                res.status().as_u16()
            ));
        }

        let mime = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|val| return val.to_str().ok())
            .filter(|val| return val.starts_with("image/"))
            .map(|val| return val.split(';').next().unwrap_or(val).trim().to_string())
            .unwrap_or_else(|| return media_type(path::Path::new(url.as_str())).to_string());

        let data = res.bytes().await?.to_vec();
        return Ok(BinaryContent::new(data, &mime));
    }
}
