#[cfg(test)]
#[path = "chat_command_test.rs"]
mod tests;

/// Reserved inputs handled by the chat loop without contacting the agent.
#[derive(Debug, PartialEq, Eq)]
pub struct ChatCommand {
    command: String,
}

impl ChatCommand {
    pub fn parse(text: &str) -> Option<ChatCommand> {
        let cmd = ChatCommand {
            command: text.trim().to_lowercase(),
        };

        if cmd.is_quit() || cmd.is_history() || cmd.is_clear() || cmd.is_empty() {
            return Some(cmd);
        }

        return None;
    }

    pub fn is_quit(&self) -> bool {
        return ["quit", "exit", "bye"].contains(&self.command.as_str());
    }

    pub fn is_history(&self) -> bool {
        return self.command == "history";
    }

    pub fn is_clear(&self) -> bool {
        return self.command == "clear";
    }

    pub fn is_empty(&self) -> bool {
        return self.command.is_empty();
    }
}
