//! The per-chat aggregate: settings, history and rate-limit timers.

use {
    chatbridge_common::Message,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// External chat identifier (negative for Telegram groups).
pub type ChatId = i64;

/// Per-chat settings. Defaults are stamped at creation; only explicit
/// configuration commands change them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub temperature: f32,
    pub model: String,
    /// Number of entries kept after each successful turn. `0` keeps everything.
    pub max_messages: usize,
    pub use_markdown: bool,
    pub system_prompt: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            model: "gpt-3.5-turbo".into(),
            max_messages: 20,
            use_markdown: false,
            system_prompt: String::new(),
        }
    }
}

/// One prompt and, once the backend answered, its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub prompt: Message,
    /// `None` while the backend call for this turn is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Message>,
}

impl ConversationEntry {
    #[must_use]
    pub fn pending(prompt: Message) -> Self {
        Self {
            prompt,
            response: None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.response.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub chat_id: ChatId,
    pub settings: ChatSettings,
    /// Oldest first.
    #[serde(default)]
    pub history: Vec<ConversationEntry>,
    /// Earliest time the next rate-limited image generation is admitted.
    pub image_gen_next_time: DateTime<Utc>,
}

impl Conversation {
    #[must_use]
    pub fn new(chat_id: ChatId, settings: ChatSettings, now: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            settings,
            history: Vec::new(),
            image_gen_next_time: now,
        }
    }

    /// Flatten completed entries into a prompt-then-response message list.
    ///
    /// Entries still waiting for a response are skipped entirely.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.history
            .iter()
            .filter_map(|entry| {
                entry
                    .response
                    .as_ref()
                    .map(|response| [entry.prompt.clone(), response.clone()])
            })
            .flatten()
            .collect()
    }

    /// Keep only the `max_messages` most recent entries.
    pub fn truncate_history(&mut self) {
        let max = self.settings.max_messages;
        if max > 0 && self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(..excess);
        }
    }

    /// Remove the last `count` entries (clamped to the history length).
    /// Returns how many were removed.
    pub fn rollback(&mut self, count: usize) -> usize {
        let removed = count.min(self.history.len());
        self.history.truncate(self.history.len() - removed);
        removed
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn done(prompt: &str, response: &str) -> ConversationEntry {
        ConversationEntry {
            prompt: Message::user(prompt),
            response: Some(Message::assistant(response)),
        }
    }

    fn conversation(max_messages: usize) -> Conversation {
        Conversation::new(
            1,
            ChatSettings {
                max_messages,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn messages_skip_pending_entries() {
        let mut conv = conversation(10);
        conv.history.push(done("a", "b"));
        conv.history
            .push(ConversationEntry::pending(Message::user("waiting")));
        conv.history.push(done("c", "d"));

        let contents: Vec<_> = conv.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn truncate_drops_oldest() {
        let mut conv = conversation(2);
        for i in 0..3 {
            conv.history.push(done(&format!("p{i}"), "r"));
        }
        conv.truncate_history();
        assert_eq!(conv.history.len(), 2);
        assert_eq!(conv.history[0].prompt.content, "p1");
    }

    #[test]
    fn zero_max_messages_keeps_everything() {
        let mut conv = conversation(0);
        for _ in 0..50 {
            conv.history.push(done("p", "r"));
        }
        conv.truncate_history();
        assert_eq!(conv.history.len(), 50);
    }

    #[test]
    fn rollback_clamps_to_len() {
        let mut conv = conversation(10);
        conv.history.push(done("a", "b"));
        conv.history.push(done("c", "d"));
        assert_eq!(conv.rollback(5), 2);
        assert!(conv.history.is_empty());
        assert_eq!(conv.rollback(1), 0);
    }

    #[test]
    fn pending_response_is_omitted_from_json() {
        let entry = ConversationEntry::pending(Message::user("hi"));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("response").is_none());
        let back: ConversationEntry = serde_json::from_value(json).unwrap();
        assert!(back.is_pending());
    }
}
