//! Shared types and error helpers used across all chatbridge crates.

pub mod error;
pub mod types;

pub use {
    error::FromMessage,
    types::{Message, Role},
};
