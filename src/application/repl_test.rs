use std::collections::VecDeque;
use std::future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::Notify;

use super::banner;
use super::Repl;
use super::Reply;
use crate::domain::models::Backend;
use crate::domain::models::BackendReply;
use crate::domain::models::BackendRequest;
use crate::domain::models::BinaryContent;
use crate::domain::models::ImageUrl;
use crate::domain::models::PromptPart;
use crate::domain::models::ToolRegistry;
use crate::domain::models::Turn;
use crate::domain::services::agent::Agent;

type Seen = Arc<Mutex<Vec<Vec<PromptPart>>>>;

/// Replies with queued texts. An `Err` entry fails that request.
struct QueuedBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
    seen: Seen,
}

#[async_trait]
impl Backend for QueuedBackend {
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    async fn generate(&self, request: &BackendRequest) -> Result<BackendReply> {
        if let Some(Turn::User(parts)) = request.turns.first() {
            self.seen.lock().unwrap().push(parts.clone());
        }

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => {
                return Ok(BackendReply {
                    text,
                    calls: vec![],
                });
            }
            Some(Err(message)) => bail!(message),
            None => bail!("no reply queued"),
        }
    }

    async fn fetch_image(&self, image_url: &ImageUrl) -> Result<BinaryContent> {
        if image_url.url.ends_with("missing.png") {
            bail!(format!("Failed to download image {}, 404", image_url.url));
        }
        return Ok(BinaryContent::new(vec![1, 2], "image/png"));
    }
}

/// Signals once it is asked for a reply, then never answers.
struct StalledBackend {
    started: Arc<Notify>,
}

#[async_trait]
impl Backend for StalledBackend {
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    async fn generate(&self, _request: &BackendRequest) -> Result<BackendReply> {
        self.started.notify_one();
        future::pending::<()>().await;
        bail!("unreachable");
    }
}

fn repl_with(replies: Vec<Result<&str, &str>>) -> (Repl, Seen) {
    let seen = Seen::default();
    let backend = QueuedBackend {
        replies: Mutex::new(
            replies
                .into_iter()
                .map(|reply| {
                    return reply
                        .map(|text| return text.to_string())
                        .map_err(|text| return text.to_string());
                })
                .collect(),
        ),
        seen: seen.clone(),
    };
    let agent = Agent::new(Box::new(backend), ToolRegistry::new(), "system", 5);

    return (Repl::new(agent), seen);
}

fn printed(reply: Reply) -> Vec<String> {
    match reply {
        Reply::Print(lines) => return lines,
        Reply::Quit => panic!("expected output, got quit"),
    }
}

#[tokio::test]
async fn it_quits_on_reserved_words() {
    let (mut repl, seen) = repl_with(vec![]);

    for word in ["quit", "EXIT", "  bye  "] {
        assert_eq!(repl.respond(word).await, Reply::Quit);
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn it_ignores_empty_input() {
    let (mut repl, seen) = repl_with(vec![]);

    assert_eq!(repl.respond("   ").await, Reply::Print(vec![]));
    assert!(repl.history().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn it_sends_text_with_history_context() {
    let (mut repl, seen) = repl_with(vec![Ok("First answer"), Ok("Second answer")]);

    let lines = printed(repl.respond("Refine NaCoO2").await);
    assert_eq!(lines, vec!["🤖 Assistant: First answer"]);

    repl.respond("Now plot it").await;

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[1],
        vec![PromptPart::Text(
            "Recent conversation history:\nuser: Refine NaCoO2\nassistant: First answer\nuser: Now plot it\n\nCurrent user message: Now plot it"
                .to_string()
        )]
    );
    assert_eq!(repl.history().len(), 4);
}

#[tokio::test]
async fn it_shows_history_without_changing_it() {
    let (mut repl, _) = repl_with(vec![Ok("Hello there")]);
    repl.respond("hi").await;

    let lines = printed(repl.respond("history").await);
    assert_eq!(
        lines,
        vec![
            "📜 Recent Conversation History:",
            "------------------------------",
            "💬 user: hi",
            "🤖 assistant: Hello there",
        ]
    );
    assert_eq!(repl.history().len(), 2);
}

#[tokio::test]
async fn it_clears_history() {
    let (mut repl, _) = repl_with(vec![Ok("Hello there")]);
    repl.respond("hi").await;

    let lines = printed(repl.respond("clear").await);
    assert_eq!(lines, vec!["🧹 Conversation history cleared!"]);
    assert!(repl.history().is_empty());
}

#[tokio::test]
async fn it_sends_image_urls_as_parts() {
    let (mut repl, seen) = repl_with(vec![Ok("A diffraction pattern")]);

    let lines = printed(
        repl.respond("Describe this https://example.com/pattern.png")
            .await,
    );
    assert_eq!(
        lines,
        vec![
            "🖼️  Loading image from URL: https://example.com/pattern.png",
            "🤖 Assistant: A diffraction pattern",
        ]
    );

    assert_eq!(
        seen.lock().unwrap()[0],
        vec![
            PromptPart::Text("Describe this".to_string()),
            PromptPart::Image(BinaryContent::new(vec![1, 2], "image/png")),
        ]
    );

    let first = &repl.history().messages()[0];
    assert!(first.has_image);
    assert_eq!(first.text, "Describe this https://example.com/pattern.png");
}

#[tokio::test]
async fn it_loads_local_images() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let image_path = dir.path().join("plot.png");
    std::fs::write(&image_path, [137, 80, 78, 71])?;

    let (mut repl, seen) = repl_with(vec![Ok("Looks refined")]);
    repl.respond(&image_path.to_string_lossy()).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].len(), 2);
    assert_eq!(
        seen[0][0],
        PromptPart::Text("Please analyze this image:".to_string())
    );
    match &seen[0][1] {
        PromptPart::Image(image) => {
            assert_eq!(image.media_type, "image/png");
            assert_eq!(image.data, vec![137, 80, 78, 71]);
        }
        other => panic!("expected an inline image, got {other:?}"),
    }
    assert!(repl.history().messages()[0].has_image);

    return Ok(());
}

#[tokio::test]
async fn it_falls_back_to_text_when_image_is_missing() {
    let (mut repl, seen) = repl_with(vec![Ok("No image here")]);

    let lines = printed(repl.respond("what is /no/such/file.png").await);
    assert_eq!(
        lines,
        vec![
            "❌ Failed to load image. Proceeding with text only.",
            "🤖 Assistant: No image here",
        ]
    );

    assert_eq!(
        seen.lock().unwrap()[0],
        vec![PromptPart::Text(
            "Recent conversation history:\nuser: what is /no/such/file.png\n\nCurrent user message: what is /no/such/file.png"
                .to_string()
        )]
    );
    assert!(!repl.history().messages()[0].has_image);
}

#[tokio::test]
async fn it_reports_errors_and_keeps_going() {
    let (mut repl, _) = repl_with(vec![Err("quota exceeded"), Ok("Recovered")]);

    let lines = printed(repl.respond("first").await);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("❌ Error: quota exceeded"));
    assert_eq!(repl.history().len(), 1);

    let lines = printed(repl.respond("second").await);
    assert_eq!(lines, vec!["🤖 Assistant: Recovered"]);
    assert_eq!(repl.history().len(), 3);
}

#[tokio::test]
async fn it_reports_failed_image_downloads() {
    let (mut repl, seen) = repl_with(vec![Ok("unused")]);

    let lines = printed(repl.respond("see https://example.com/missing.png").await);
    assert!(lines
        .iter()
        .any(|line| return line.contains("❌ Error: Failed to download image")));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn it_stops_when_interrupted_during_a_turn() -> Result<()> {
    let started = Arc::new(Notify::new());
    let backend = StalledBackend {
        started: started.clone(),
    };
    let agent = Agent::new(Box::new(backend), ToolRegistry::new(), "system", 5);
    let mut repl = Repl::new(agent);

    // The writer half stays open so the loop can only end on the interrupt.
    let (reader, mut writer) = tokio::io::duplex(64);
    writer.write_all(b"run the refinement\n").await?;

    let interrupt = async move {
        started.notified().await;
    };
    tokio::time::timeout(
        Duration::from_secs(5),
        repl.run_until(BufReader::new(reader), interrupt),
    )
    .await??;

    assert_eq!(repl.history().len(), 1);
    drop(writer);

    return Ok(());
}

#[tokio::test]
async fn it_stops_when_interrupted_while_waiting() -> Result<()> {
    let (mut repl, seen) = repl_with(vec![]);
    let (reader, writer) = tokio::io::duplex(64);

    tokio::time::timeout(
        Duration::from_secs(5),
        repl.run_until(BufReader::new(reader), future::ready(())),
    )
    .await??;

    assert!(seen.lock().unwrap().is_empty());
    drop(writer);

    return Ok(());
}

#[tokio::test]
async fn it_runs_until_quit() -> Result<()> {
    let (mut repl, seen) = repl_with(vec![Ok("Hello")]);
    let input: &[u8] = b"hello\nquit\nnever sent\n";

    repl.run(input).await?;

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(repl.history().len(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_stops_at_end_of_input() -> Result<()> {
    let (mut repl, seen) = repl_with(vec![]);
    let input: &[u8] = b"history\n";

    repl.run(input).await?;

    assert!(seen.lock().unwrap().is_empty());

    return Ok(());
}

#[test]
fn it_lists_commands_in_banner() {
    let text = banner();
    assert!(text.starts_with("🪶 Guillemot chat framework"));
    assert!(text.contains("Type 'history' to see recent conversation history"));
}
