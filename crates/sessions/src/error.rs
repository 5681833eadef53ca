use thiserror::Error;

use crate::conversation::ChatId;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("state of chat {chat_id} is unreadable: {source}")]
    Corrupt {
        chat_id: ChatId,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    #[error("file lock failed: {message}")]
    Lock { message: String },
}

impl Error {
    #[must_use]
    pub fn lock_failed(message: impl std::fmt::Display) -> Self {
        Self::Lock {
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
