//! Telegram adapter for the dispatch engine.
//!
//! Long-polls the Bot API with teloxide, turns messages into inbound events
//! for the engine's ingress, and delivers replies through [`TelegramOutbound`].

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;

pub use {
    bot::{connect, start_polling},
    error::{Error, Result},
    outbound::TelegramOutbound,
};
