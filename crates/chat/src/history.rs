//! Rendering of conversation history for display.

use chatbridge_common::Message;

use crate::prompts::HISTORY_EMPTY;

/// Maximum characters per outbound message.
pub const MAX_CHUNK_CHARS: usize = 4096;

/// Render `messages` as `"<index>. <Role>: <content>"` lines packed into
/// chunks of at most [`MAX_CHUNK_CHARS`] characters.
///
/// A new chunk starts whenever the next line would overflow the current one.
/// A single line longer than the cap is split across consecutive chunks.
pub fn format_history(messages: &[Message]) -> Vec<String> {
    if messages.is_empty() {
        return vec![HISTORY_EMPTY.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for (i, message) in messages.iter().enumerate() {
        let line = format!("{}. {}: {}\n", i + 1, message.role.title(), message.content);
        let line_len = line.chars().count();

        if current_len + line_len > MAX_CHUNK_CHARS && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= MAX_CHUNK_CHARS {
            current.push_str(&line);
            current_len += line_len;
            continue;
        }

        let mut pieces = split_chars(&line, MAX_CHUNK_CHARS);
        if let Some(last) = pieces.pop() {
            chunks.extend(pieces);
            current_len = last.chars().count();
            current = last;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split `text` into pieces of at most `max` characters.
pub fn split_chars(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

/// `"1 message"`, `"3 messages"`.
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
