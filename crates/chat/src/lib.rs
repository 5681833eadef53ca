//! Conversation dispatch engine.
//!
//! Inbound events pass the [`access`] gate in [`ingress`], wait in the
//! bounded [`queue`], and are handled by the [`worker`] pool. A worker takes
//! ownership of the chat through the [`backlog`], runs the [`machine`],
//! calls the backend if asked to, persists the conversation and sends the
//! replies.

pub mod access;
pub mod backlog;
pub mod command;
pub mod error;
pub mod history;
pub mod ingress;
pub mod machine;
pub mod prompts;
pub mod queue;
pub mod worker;

#[cfg(test)]
mod testing;

pub use {
    access::{AccessControl, AccessDenied, AllowListChange},
    backlog::{ChatBacklog, Claim},
    command::{Command, command_menu},
    error::{Error, Result},
    ingress::{Admission, Ingress},
    machine::{ConversationMachine, Reply},
    queue::{DispatchReceiver, DispatchSender, dispatch_queue},
    worker::{WorkerContext, WorkerPool, chat_settings},
};
