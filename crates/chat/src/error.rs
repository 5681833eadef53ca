use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] chatbridge_config::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    #[error("dispatch queue is closed")]
    QueueClosed,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message {
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
