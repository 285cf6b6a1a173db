#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::Local;
use chrono::SecondsFormat;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Author;

/// A single entry of the conversation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: Author,
    pub text: String,
    pub has_image: bool,
    pub timestamp: String,
}

impl Message {
    pub fn new(author: Author, text: &str) -> Message {
        return Message::new_at(author, text, false, Local::now());
    }

    pub fn new_with_image(author: Author, text: &str) -> Message {
        return Message::new_at(author, text, true, Local::now());
    }

    pub fn new_at(author: Author, text: &str, has_image: bool, at: DateTime<Local>) -> Message {
        return Message {
            author,
            text: text.to_string(),
            has_image,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, false),
        };
    }

    /// Line used when the log is fed back to the model as context.
    pub fn as_context_line(&self) -> String {
        let mut text = self.text.to_string();
        if self.has_image {
            text += " [included an image]";
        }

        return format!("{}: {text}", self.author.to_string());
    }

    /// Line used by the `history` command.
    pub fn as_display_line(&self) -> String {
        let mut text = self.text.to_string();
        if self.has_image {
            text += " 🖼️";
        }

        return format!(
            "{} {}: {text}",
            self.author.emoji(),
            self.author.to_string()
        );
    }
}
