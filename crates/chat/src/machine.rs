//! The per-chat state machine.
//!
//! [`ConversationMachine::apply`] turns one inbound event into replies, an
//! optional backend call and an optional allow-list action, mutating the
//! conversation in place. When a backend call is requested the caller runs
//! it and feeds the result back through [`ConversationMachine::complete`].
//! If the call fails the caller drops the mutated conversation instead of
//! persisting it.

use {
    chatbridge_channels::{ImagePayload, InboundEvent},
    chatbridge_common::Message,
    chatbridge_config::BotConfig,
    chatbridge_providers::{CompletionRequest, GeneratedImage},
    chatbridge_sessions::{Conversation, ConversationEntry},
    chrono::{DateTime, Duration, Utc},
    tracing::{debug, warn},
};

use crate::{
    command::Command,
    history::{format_history, pluralize},
    prompts::{
        ADMIN_ONLY, BACKEND_FAILURE, GREETING, HELP, HISTORY_CLEARED, HISTORY_EMPTY,
        IMAGINE_USAGE, TEMPERATURE_INVALID, TextTask,
    },
};

pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=1.2;

/// Facts about the current turn that do not live in the conversation.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    pub now: DateTime<Utc>,
    /// Sender is the administrator.
    pub privileged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text { text: String, markdown: bool },
    Image(ImagePayload),
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            markdown: true,
        }
    }
}

/// Allow-list mutation requested by an administrator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    AddUser(i64),
    RemoveUser(i64),
    Reload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// Conversational turn; the answer completes the pending entry.
    Chat(CompletionRequest),
    /// One-shot text task outside the history.
    Text(CompletionRequest),
    Image { prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutput {
    Text(String),
    Image(GeneratedImage),
}

/// Outcome of applying one event.
#[derive(Debug, Default)]
pub struct Step {
    pub replies: Vec<Reply>,
    pub call: Option<BackendCall>,
    pub admin: Option<AdminAction>,
    /// The conversation changed and must be persisted.
    pub dirty: bool,
}

impl Step {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            ..Default::default()
        }
    }

    fn changed(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            dirty: true,
            ..Default::default()
        }
    }

    fn call(call: BackendCall) -> Self {
        Self {
            call: Some(call),
            dirty: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationMachine {
    image_cooldown: Duration,
}

impl Default for ConversationMachine {
    fn default() -> Self {
        Self::new(Duration::seconds(900))
    }
}

impl ConversationMachine {
    pub fn new(image_cooldown: Duration) -> Self {
        Self { image_cooldown }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        let secs = i64::try_from(config.image.cooldown_secs).unwrap_or(i64::MAX);
        Self::new(Duration::try_seconds(secs).unwrap_or(Duration::MAX))
    }

    pub fn apply(&self, conv: &mut Conversation, event: &InboundEvent, ctx: TurnContext) -> Step {
        let Some(invocation) = &event.command else {
            return self.chat_turn(conv, &event.text);
        };

        let command = Command::parse(invocation);
        debug!(chat_id = conv.chat_id, command = command.name(), "applying command");
        if command.is_admin_only() && !ctx.privileged {
            warn!(
                chat_id = conv.chat_id,
                sender_id = event.sender.id,
                command = command.name(),
                "admin command from unprivileged sender"
            );
            return Step::reply(Reply::plain(ADMIN_ONLY));
        }

        match command {
            Command::Help => Step::reply(Reply::plain(HELP)),
            Command::Start => Step::reply(Reply::markdown(GREETING)),
            Command::History => Step {
                replies: format_history(&conv.messages())
                    .into_iter()
                    .map(Reply::plain)
                    .collect(),
                ..Default::default()
            },
            Command::Clear => {
                conv.clear();
                Step::changed(Reply::plain(HISTORY_CLEARED))
            },
            Command::Rollback(args) => rollback(conv, &args),
            Command::Translate(args) => text_task(conv, TextTask::Translate, &args),
            Command::FixGrammar(args) => text_task(conv, TextTask::FixGrammar, &args),
            Command::Enhance(args) => text_task(conv, TextTask::Enhance, &args),
            Command::Imagine(args) => self.imagine(conv, &args, ctx),
            Command::Temperature(args) => temperature(conv, &args),
            Command::AddUser(args) => admin_user_action(&args, "add", AdminAction::AddUser),
            Command::RemoveUser(args) => {
                admin_user_action(&args, "remove", AdminAction::RemoveUser)
            },
            Command::Reload => Step {
                admin: Some(AdminAction::Reload),
                ..Default::default()
            },
            Command::Unknown(name) => Step::reply(Reply::plain(format!(
                "Unknown command /{name}. Type /help for the list of commands."
            ))),
        }
    }

    /// Fold a successful backend result into the conversation.
    pub fn complete(
        &self,
        conv: &mut Conversation,
        call: &BackendCall,
        output: BackendOutput,
    ) -> Vec<Reply> {
        let markdown = conv.settings.use_markdown;
        match (call, output) {
            (BackendCall::Chat(_), BackendOutput::Text(text)) => {
                match conv.history.iter_mut().rev().find(|e| e.is_pending()) {
                    Some(entry) => entry.response = Some(Message::assistant(text.clone())),
                    None => warn!(chat_id = conv.chat_id, "no pending entry for chat answer"),
                }
                conv.truncate_history();
                vec![Reply::Text { text, markdown }]
            },
            (BackendCall::Text(_), BackendOutput::Text(text)) => vec![Reply::Text { text, markdown }],
            (BackendCall::Image { .. }, BackendOutput::Image(image)) => {
                vec![Reply::Image(match image {
                    GeneratedImage::Url(url) => ImagePayload::Url(url),
                    GeneratedImage::Bytes(bytes) => ImagePayload::Bytes(bytes),
                })]
            },
            (call, _) => {
                warn!(chat_id = conv.chat_id, ?call, "backend output does not match call");
                vec![Reply::plain(BACKEND_FAILURE)]
            },
        }
    }

    fn chat_turn(&self, conv: &mut Conversation, text: &str) -> Step {
        let text = text.trim();
        if text.is_empty() {
            return Step::default();
        }

        let prompt = Message::user(text);
        let mut messages = conv.messages();
        messages.push(prompt.clone());
        conv.history.push(ConversationEntry::pending(prompt));

        Step::call(BackendCall::Chat(CompletionRequest {
            system_prompt: conv.settings.system_prompt.clone(),
            messages,
            temperature: conv.settings.temperature,
            model: conv.settings.model.clone(),
        }))
    }

    fn imagine(&self, conv: &mut Conversation, args: &str, ctx: TurnContext) -> Step {
        if ctx.now < conv.image_gen_next_time && !ctx.privileged {
            return Step::reply(Reply::plain(format!(
                "Your next image generation will be available at {} UTC.",
                conv.image_gen_next_time.format("%H:%M:%S")
            )));
        }
        if args.is_empty() {
            return Step::reply(Reply::plain(IMAGINE_USAGE));
        }

        conv.image_gen_next_time = ctx
            .now
            .checked_add_signed(self.image_cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Step::call(BackendCall::Image {
            prompt: args.to_string(),
        })
    }
}

fn rollback(conv: &mut Conversation, args: &str) -> Step {
    let count = if args.is_empty() {
        1
    } else {
        match args.parse::<i64>() {
            Ok(n) if n >= 1 => usize::try_from(n).unwrap_or(usize::MAX),
            Ok(_) => 1,
            Err(_) => {
                return Step::reply(Reply::plain(format!(
                    "Invalid number of messages: {args}"
                )));
            },
        }
    };

    if conv.history.is_empty() {
        return Step::reply(Reply::plain(HISTORY_EMPTY));
    }
    let removed = conv.rollback(count);
    Step::changed(Reply::plain(format!(
        "Removed {}.",
        pluralize(removed, "message")
    )))
}

fn text_task(conv: &Conversation, task: TextTask, args: &str) -> Step {
    if args.is_empty() {
        return Step::reply(Reply::plain(task.usage()));
    }
    Step {
        call: Some(BackendCall::Text(CompletionRequest {
            system_prompt: task.system_prompt().to_string(),
            messages: vec![Message::user(task.instruction(args))],
            temperature: conv.settings.temperature,
            model: conv.settings.model.clone(),
        })),
        ..Default::default()
    }
}

fn temperature(conv: &mut Conversation, args: &str) -> Step {
    if args.is_empty() {
        return Step::reply(Reply::plain(format!(
            "Current temperature is {:.1}.",
            conv.settings.temperature
        )));
    }
    match args.parse::<f32>() {
        Ok(value) if TEMPERATURE_RANGE.contains(&value) => {
            conv.settings.temperature = value;
            Step::changed(Reply::plain(format!("Temperature set to {value:.1}.")))
        },
        _ => Step::reply(Reply::plain(TEMPERATURE_INVALID)),
    }
}

fn admin_user_action(args: &str, verb: &str, action: fn(i64) -> AdminAction) -> Step {
    if args.is_empty() {
        return Step::reply(Reply::plain(format!(
            "Please provide a user id to {verb}"
        )));
    }
    match args.parse::<i64>() {
        Ok(id) => Step {
            admin: Some(action(id)),
            ..Default::default()
        },
        Err(_) => Step::reply(Reply::plain(format!("Invalid user id: {args}"))),
    }
}
