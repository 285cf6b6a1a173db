#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use super::Author;
use super::Message;

/// Entries shown by the `history` command.
pub const HISTORY_DISPLAY_LIMIT: usize = 10;
/// Entries prepended to a text-only prompt.
pub const HISTORY_CONTEXT_LIMIT: usize = 5;

/// Append-only message log owned by a single chat session.
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> ConversationHistory {
        return ConversationHistory::default();
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_message(&mut self, author: Author, text: &str, has_image: bool) {
        if has_image {
            self.push(Message::new_with_image(author, text));
        } else {
            self.push(Message::new(author, text));
        }
    }

    pub fn messages(&self) -> &[Message] {
        return &self.messages;
    }

    pub fn len(&self) -> usize {
        return self.messages.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.messages.is_empty();
    }

    /// The last `limit` messages in chronological order.
    pub fn recent(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        return &self.messages[start..];
    }

    pub fn formatted(&self, limit: usize) -> String {
        return self
            .recent(limit)
            .iter()
            .map(|msg| return msg.as_context_line())
            .collect::<Vec<String>>()
            .join("\n");
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Wraps the current user text with the recent log for a text-only
    /// agent request.
    pub fn prompt_with_context(&self, user_text: &str) -> String {
        return format!(
            "Recent conversation history:\n{}\n\nCurrent user message: {user_text}",
            self.formatted(HISTORY_CONTEXT_LIMIT)
        );
    }
}
