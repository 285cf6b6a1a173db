use anyhow::Result;
use serde_json::json;

use super::Gemini;
use super::GenerateContentRequest;
use crate::domain::models::Backend;
use crate::domain::models::BackendRequest;
use crate::domain::models::BinaryContent;
use crate::domain::models::FunctionCall;
use crate::domain::models::FunctionReturn;
use crate::domain::models::ImageUrl;
use crate::domain::models::PromptPart;
use crate::domain::models::ToolDefinition;
use crate::domain::models::Turn;

impl Gemini {
    fn with_url(url: String) -> Gemini {
        return Gemini {
            url,
            token: "abc".to_string(),
            model: "model-1".to_string(),
        };
    }
}

fn request(turns: Vec<Turn>) -> BackendRequest {
    return BackendRequest {
        system_prompt: "You refine patterns".to_string(),
        turns,
        tools: vec![ToolDefinition {
            name: "echo".to_string(),
            description: "Echoes".to_string(),
            parameters: json!({ "type": "object" }),
        }],
    };
}

#[tokio::test]
async fn it_successfully_health_checks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1?key=abc")
        .with_status(200)
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn it_successfully_health_checks_with_official_api() {
    let token = match std::env::var("GEMINI_API_KEY") {
        Ok(token) => token,
        Err(_) => {
            println!("There is no token in environment defined, skipping test");
            return;
        }
    };
    let backend = Gemini {
        url: "https://generativelanguage.googleapis.com".to_string(),
        token,
        model: "gemini-2.5-flash-lite".to_string(),
    };

    let res = backend.health_check().await;
    assert!(res.is_ok());
}

#[tokio::test]
async fn it_fails_health_checks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1?key=abc")
        .with_status(500)
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn it_requires_a_token() {
    let backend = Gemini {
        url: "http://localhost".to_string(),
        token: "".to_string(),
        model: "model-1".to_string(),
    };

    let err = backend.health_check().await.unwrap_err();
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn it_maps_turns_to_contents() -> Result<()> {
    let backend = Gemini::with_url("http://localhost".to_string());
    let req = request(vec![
        Turn::User(vec![
            PromptPart::Text("Look at this".to_string()),
            PromptPart::Image(BinaryContent::new(vec![0, 1, 2], "image/png")),
        ]),
        Turn::Model {
            text: "".to_string(),
            calls: vec![FunctionCall {
                name: "echo".to_string(),
                args: json!({ "a": 1 }),
            }],
        },
        Turn::ToolReturns(vec![FunctionReturn {
            name: "echo".to_string(),
            response: json!(["not", "an", "object"]),
        }]),
    ]);

    let body = GenerateContentRequest {
        system_instruction: super::Content {
            role: "".to_string(),
            parts: vec![super::Part::text(&req.system_prompt)],
        },
        contents: backend.to_contents(&req.turns)?,
        tools: super::to_declarations(&req.tools),
    };

    assert_eq!(
        serde_json::to_value(&body)?,
        json!({
            "systemInstruction": { "parts": [{ "text": "You refine patterns" }] },
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        { "text": "Look at this" },
                        { "inlineData": { "mimeType": "image/png", "data": "AAEC" } }
                    ]
                },
                {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "echo", "args": { "a": 1 } } }]
                },
                {
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": "echo",
                            "response": { "result": ["not", "an", "object"] }
                        }
                    }]
                }
            ],
            "tools": [{
                "functionDeclarations": [{
                    "name": "echo",
                    "description": "Echoes",
                    "parameters": { "type": "object" }
                }]
            }]
        })
    );

    return Ok(());
}

#[tokio::test]
async fn it_downloads_image_urls() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/refinement.jpg")
        .with_status(200)
        .with_header("content-type", "image/png; charset=binary")
        .with_body(vec![9, 9])
        .expect(1)
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let image = backend
        .fetch_image(&ImageUrl::new(&format!("{}/refinement.jpg", server.url())))
        .await?;
    mock.assert_async().await;

    assert_eq!(image, BinaryContent::new(vec![9, 9], "image/png"));
    let contents = backend.to_contents(&[Turn::User(vec![PromptPart::Image(image)])])?;
    let blob = contents[0].parts[0].inline_data.clone().unwrap();
    assert_eq!(blob.mime_type, "image/png");
    assert_eq!(blob.data, "CQk=");

    return Ok(());
}

#[tokio::test]
async fn it_fails_on_missing_images() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/gone.png")
        .with_status(404)
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let res = backend
        .fetch_image(&ImageUrl::new(&format!("{}/gone.png", server.url())))
        .await;
    mock.assert_async().await;

    assert!(res.unwrap_err().to_string().ends_with("gone.png, 404"));
}

#[test]
fn it_never_downloads_while_mapping_turns() {
    let backend = Gemini::with_url("http://localhost:1".to_string());
    let res = backend.to_contents(&[Turn::User(vec![PromptPart::ImageUrl(ImageUrl::new(
        "http://localhost:1/pattern.png",
    ))])]);

    assert_eq!(
        res.unwrap_err().to_string(),
        "Image http://localhost:1/pattern.png must be downloaded before it is sent"
    );
}

#[tokio::test]
async fn it_gets_text_replies() -> Result<()> {
    let body = json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "Rwp " }, { "text": "is 4.2" }] },
            "finishReason": "STOP"
        }]
    });

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent?key=abc")
        .match_body(mockito::Matcher::PartialJson(json!({
            "systemInstruction": { "parts": [{ "text": "You refine patterns" }] }
        })))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let reply = backend
        .generate(&request(vec![Turn::User(vec![PromptPart::Text(
            "How good is the fit?".to_string(),
        )])]))
        .await?;
    mock.assert_async().await;

    assert!(reply.is_final());
    assert_eq!(reply.text, "Rwp is 4.2");

    return Ok(());
}

#[tokio::test]
async fn it_gets_function_calls() -> Result<()> {
    let body = json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "Saving the input file." },
                    {
                        "functionCall": { "name": "echo", "args": { "a": 1 } },
                        "thoughtSignature": "c2ln"
                    }
                ]
            },
            "finishReason": "STOP"
        }]
    });

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent?key=abc")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let reply = backend
        .generate(&request(vec![Turn::User(vec![PromptPart::Text(
            "Save it".to_string(),
        )])]))
        .await?;
    mock.assert_async().await;

    assert!(!reply.is_final());
    assert_eq!(reply.text, "Saving the input file.");
    assert_eq!(
        reply.calls,
        vec![FunctionCall {
            name: "echo".to_string(),
            args: json!({ "a": 1 }),
        }]
    );

    return Ok(());
}

#[tokio::test]
async fn it_fails_on_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/model-1:generateContent?key=abc")
        .with_status(429)
        .with_body("{}")
        .create_async()
        .await;

    let backend = Gemini::with_url(server.url());
    let err = backend
        .generate(&request(vec![Turn::User(vec![PromptPart::Text(
            "hi".to_string(),
        )])]))
        .await
        .unwrap_err();
    mock.assert_async().await;

    assert_eq!(err.to_string(), "Failed to make completion request to Gemini, 429");
}
