//! Platform-neutral channel surface.
//!
//! A messaging platform adapter turns its updates into [`InboundEvent`]s and
//! implements [`ChannelOutbound`] so the workers can answer without knowing
//! which platform they are talking to.

pub mod error;
pub mod event;
pub mod gating;
pub mod outbound;

pub use {
    error::{Error, Result},
    event::{ChatType, CommandInvocation, InboundEvent, Sender},
    gating::permit,
    outbound::{ChannelOutbound, ImagePayload},
};
