use {async_trait::async_trait, chatbridge_common::Message};

use crate::error::Result;

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Oldest first, without the system prompt.
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    Url(String),
    Bytes(Vec<u8>),
}

/// Text completion backend.
#[async_trait]
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Image generation backend.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage>;
}
