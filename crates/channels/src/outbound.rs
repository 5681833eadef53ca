use async_trait::async_trait;

use crate::error::Result;

/// Image to deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Url(String),
    Bytes(Vec<u8>),
}

/// Send messages to a chat on the platform.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send `text` to `chat_id`, threaded under `reply_to` when given.
    /// `rich` asks for platform formatting; adapters fall back to plain text
    /// when the platform rejects the markup.
    async fn reply(&self, chat_id: i64, reply_to: Option<i32>, text: &str, rich: bool)
    -> Result<()>;

    async fn send_image(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        image: &ImagePayload,
    ) -> Result<()>;

    /// Administrative side channel: a plain message to a user id.
    async fn notify(&self, target: i64, text: &str) -> Result<()>;
}
