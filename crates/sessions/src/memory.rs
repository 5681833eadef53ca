use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;

use crate::{
    conversation::{ChatId, Conversation},
    error::Result,
    store::ChatStore,
};

/// Process-local store. State is lost on restart.
#[derive(Default)]
pub struct MemoryChatStore {
    chats: RwLock<HashMap<ChatId, Conversation>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chats.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn get(&self, chat_id: ChatId) -> Result<Option<Conversation>> {
        Ok(self
            .chats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&chat_id)
            .cloned())
    }

    async fn set(&self, chat_id: ChatId, conversation: &Conversation) -> Result<()> {
        self.chats
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chat_id, conversation.clone());
        Ok(())
    }
}
