use serde::{Deserialize, Serialize};

/// Who sent an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    /// First and last name joined by a space.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)?;
        if let Some(username) = &self.username {
            write!(f, " @{username}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-to-one chat with the bot.
    Private,
    /// Groups, supergroups and channels.
    Group,
}

/// A command-shaped message split into name and argument text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// Name without the leading slash or `@bot` suffix.
    pub name: String,
    /// Remaining text, trimmed. Empty when there is none.
    pub args: String,
}

impl CommandInvocation {
    /// Split `/name[@bot] args...`. Returns `None` for text that is not
    /// command-shaped.
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.trim_start().strip_prefix('/')?;
        let (head, args) = match body.find(char::is_whitespace) {
            Some(idx) => (&body[..idx], body[idx..].trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: args.to_string(),
        })
    }
}

/// Immutable snapshot of one platform message, consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub sender: Sender,
    pub chat_id: i64,
    pub chat_type: ChatType,
    pub message_id: i32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandInvocation>,
}

impl InboundEvent {
    /// Build an event, extracting the command from `text` when present.
    pub fn new(
        sender: Sender,
        chat_id: i64,
        chat_type: ChatType,
        message_id: i32,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let command = CommandInvocation::parse(&text);
        Self {
            sender,
            chat_id,
            chat_type,
            message_id,
            text,
            command,
        }
    }

    #[must_use]
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.chat_type == ChatType::Private
    }
}
