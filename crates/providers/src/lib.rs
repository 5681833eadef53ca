//! Language-model backends used by the chat workers.

pub mod backend;
pub mod error;
pub mod openai;

pub use {
    backend::{CompletionRequest, GeneratedImage, ImageBackend, TextBackend},
    error::{BackendError, Result},
    openai::OpenAiProvider,
};
