#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

use std::future::Future;

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

use crate::domain::models::Author;
use crate::domain::models::ChatCommand;
use crate::domain::models::ConversationHistory;
use crate::domain::models::ImageUrl;
use crate::domain::models::PromptPart;
use crate::domain::models::HISTORY_DISPLAY_LIMIT;
use crate::domain::services::agent::Agent;
use crate::domain::services::find_image_reference;
use crate::domain::services::load_local_image;
use crate::domain::services::ImageReference;

const RULE: &str = "========================================";
const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this image:";

/// What the chat loop does after handling one line of input.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Quit,
    Print(Vec<String>),
}

pub fn banner() -> String {
    return [
        "🪶 Guillemot chat framework",
        RULE,
        "Type 'quit', 'exit', or 'bye' to end the conversation",
        "Type 'history' to see recent conversation history",
        "Type 'clear' to clear conversation history",
        "🖼️  Include image URLs or local file paths for image analysis",
        "   Examples: 'Describe this image: https://example.com/image.jpg'",
        "             'What's in this photo? /path/to/image.png'",
        RULE,
    ]
    .join("\n");
}

/// A single chat session. The session owns its conversation history and
/// sends one request to the agent at a time.
pub struct Repl {
    agent: Agent,
    history: ConversationHistory,
}

impl Repl {
    pub fn new(agent: Agent) -> Repl {
        return Repl {
            agent,
            history: ConversationHistory::new(),
        };
    }

    pub fn history(&self) -> &ConversationHistory {
        return &self.history;
    }

    fn handle_command(&mut self, cmd: &ChatCommand) -> Reply {
        if cmd.is_quit() {
            return Reply::Quit;
        }

        if cmd.is_history() {
            let mut lines = vec![
                "📜 Recent Conversation History:".to_string(),
                "-".repeat(30),
            ];
            lines.extend(
                self.history
                    .recent(HISTORY_DISPLAY_LIMIT)
                    .iter()
                    .map(|msg| return msg.as_display_line()),
            );
            return Reply::Print(lines);
        }

        if cmd.is_clear() {
            self.history.clear();
            return Reply::Print(vec!["🧹 Conversation history cleared!".to_string()]);
        }

        return Reply::Print(vec![]);
    }

    /// Builds the agent prompt for a line of input. Returns the prompt parts,
    /// whether an image was attached, and status lines for the console.
    async fn build_prompt(&self, input: &str) -> (Vec<PromptPart>, bool, Vec<String>) {
        let reference = match find_image_reference(input) {
            Some(reference) => reference,
            None => return (vec![], false, vec![]),
        };

        let mut text = reference.text().to_string();
        if text.is_empty() {
            text = DEFAULT_IMAGE_PROMPT.to_string();
        }

        match reference {
            ImageReference::Url { url, .. } => {
                let notice = format!("🖼️  Loading image from URL: {url}");
                let parts = vec![
                    PromptPart::Text(text),
                    PromptPart::ImageUrl(ImageUrl::new(&url)),
                ];
                return (parts, true, vec![notice]);
            }
            ImageReference::LocalPath { path, .. } => {
                if let Some(image) = load_local_image(&path).await {
                    let notice = format!("🖼️  Loaded local image: {path}");
                    let parts = vec![PromptPart::Text(text), PromptPart::Image(image)];
                    return (parts, true, vec![notice]);
                }

                let notice = "❌ Failed to load image. Proceeding with text only.".to_string();
                return (vec![], false, vec![notice]);
            }
        }
    }

    async fn handle_turn(&mut self, input: &str, lines: &mut Vec<String>) -> Result<String> {
        let (mut parts, has_image, notices) = self.build_prompt(input).await;
        lines.extend(notices);

        self.history.add_message(Author::User, input, has_image);
        if !has_image {
            parts = vec![PromptPart::Text(self.history.prompt_with_context(input))];
        }

        tracing::debug!(has_image, history = self.history.len(), "Dispatching turn");
        let response = self.agent.run(parts).await?;
        self.history.add_message(Author::Assistant, &response, false);

        return Ok(response);
    }

    /// Handles one line of input. Errors from the agent are reported in the
    /// reply and never end the session.
    pub async fn respond(&mut self, line: &str) -> Reply {
        let input = line.trim();
        if let Some(cmd) = ChatCommand::parse(input) {
            return self.handle_command(&cmd);
        }

        let mut lines = vec![];
        match self.handle_turn(input, &mut lines).await {
            Ok(response) => {
                lines.push(format!("🤖 Assistant: {response}"));
            }
            Err(err) => {
                tracing::error!(error = ?err, "Chat turn failed");
                lines.push(format!("❌ Error: {err:#}").red().to_string());
                lines.push("Please try again or type 'quit' to exit.".to_string());
            }
        }

        return Reply::Print(lines);
    }

    /// Reads lines until a quit command, end of input or Ctrl-C.
    pub async fn run<R>(&mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        return self.run_until(reader, tokio::signal::ctrl_c()).await;
    }

    /// Reads lines until a quit command, end of input or `interrupt`
    /// resolves. The interrupt is watched while waiting for input and while
    /// the agent works on a turn.
    pub async fn run_until<R, F>(&mut self, reader: R, interrupt: F) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        F: Future,
    {
        println!("{}", banner());
        let mut lines = reader.lines();
        tokio::pin!(interrupt);

        loop {
            println!("\n{}", "💬 You:".green());
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = &mut interrupt => None,
            };

            let line = match line {
                Some(line) => line,
                None => break,
            };

            let reply = tokio::select! {
                reply = self.respond(&line) => reply,
                _ = &mut interrupt => {
                    tracing::debug!("Interrupted while the agent was running");
                    Reply::Quit
                }
            };

            match reply {
                Reply::Quit => break,
                Reply::Print(output) => {
                    for text in output {
                        println!("{text}");
                    }
                }
            }
        }

        println!("\n👋 Goodbye!");
        return Ok(());
    }

    pub async fn run_stdin(&mut self) -> Result<()> {
        return self.run(BufReader::new(tokio::io::stdin())).await;
    }
}
