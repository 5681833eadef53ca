//! Per-chat conversation state and its storage.
//!
//! A [`Conversation`] is created lazily the first time a chat is seen and
//! lives for the lifetime of the process. Stores implement [`ChatStore`];
//! [`FileChatStore`] keeps one JSON document per chat under
//! `<data_dir>/chats/<chat_id>.json` with file locking for concurrent access.

pub mod conversation;
pub mod error;
pub mod memory;
pub mod store;

pub use {
    conversation::{ChatId, ChatSettings, Conversation, ConversationEntry},
    error::{Error, Result},
    memory::MemoryChatStore,
    store::{ChatStore, FileChatStore},
};
