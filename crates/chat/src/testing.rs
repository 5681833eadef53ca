//! In-memory collaborators for engine tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    chatbridge_channels::{ChannelOutbound, ChatType, ImagePayload, InboundEvent, Sender},
    chatbridge_providers::{
        BackendError, CompletionRequest, GeneratedImage, ImageBackend, TextBackend,
    },
    chatbridge_sessions::{ChatId, ChatSettings, ChatStore, Conversation, MemoryChatStore},
    chrono::{DateTime, Utc},
};

use crate::{
    access::AccessControl, backlog::ChatBacklog, machine::ConversationMachine,
    worker::WorkerContext,
};

pub const ADMIN: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Reply {
        chat_id: i64,
        reply_to: Option<i32>,
        text: String,
        rich: bool,
    },
    Image {
        chat_id: i64,
        image: ImagePayload,
    },
    Notify {
        target: i64,
        text: String,
    },
}

#[derive(Default)]
pub struct RecordingOutbound {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingOutbound {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Reply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<(i64, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Notify { target, text } => Some((target, text)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn reply(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        rich: bool,
    ) -> chatbridge_channels::Result<()> {
        self.sent.lock().unwrap().push(Sent::Reply {
            chat_id,
            reply_to,
            text: text.to_string(),
            rich,
        });
        Ok(())
    }

    async fn send_image(
        &self,
        chat_id: i64,
        _reply_to: Option<i32>,
        image: &ImagePayload,
    ) -> chatbridge_channels::Result<()> {
        self.sent.lock().unwrap().push(Sent::Image {
            chat_id,
            image: image.clone(),
        });
        Ok(())
    }

    async fn notify(&self, target: i64, text: &str) -> chatbridge_channels::Result<()> {
        self.sent.lock().unwrap().push(Sent::Notify {
            target,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Text and image backend answering from a script, `"ok"` by default.
#[derive(Default)]
pub struct ScriptedBackend {
    pub answers: Mutex<VecDeque<Result<String, BackendError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub image_calls: AtomicUsize,
    pub fail_images: bool,
    pub delay: Option<std::time::Duration>,
}

impl ScriptedBackend {
    pub fn push(&self, answer: Result<String, BackendError>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn text_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

pub fn server_error() -> BackendError {
    BackendError::Api {
        status: 500,
        body: "boom".into(),
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> chatbridge_providers::Result<String> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("ok".into()))
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    async fn generate_image(&self, _prompt: &str) -> chatbridge_providers::Result<GeneratedImage> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_images {
            return Err(server_error());
        }
        Ok(GeneratedImage::Url("https://img.test/1.png".into()))
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct BrokenStore {
    inner: MemoryChatStore,
}

#[async_trait]
impl ChatStore for BrokenStore {
    async fn get(&self, chat_id: ChatId) -> chatbridge_sessions::Result<Option<Conversation>> {
        self.inner.get(chat_id).await
    }

    async fn set(&self, _chat_id: ChatId, _conv: &Conversation) -> chatbridge_sessions::Result<()> {
        Err(chatbridge_sessions::Error::lock_failed("disk full"))
    }

    async fn get_or_create(
        &self,
        chat_id: ChatId,
        defaults: &ChatSettings,
        now: DateTime<Utc>,
    ) -> chatbridge_sessions::Result<(Conversation, bool)> {
        Ok((Conversation::new(chat_id, defaults.clone(), now), true))
    }
}

pub struct Harness {
    pub store: Arc<dyn ChatStore>,
    pub backend: Arc<ScriptedBackend>,
    pub outbound: Arc<RecordingOutbound>,
    pub access: Arc<AccessControl>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Arc::new(MemoryChatStore::new()), ScriptedBackend::default())
    }

    pub fn with(store: Arc<dyn ChatStore>, backend: ScriptedBackend) -> Self {
        Self {
            store,
            backend: Arc::new(backend),
            outbound: Arc::new(RecordingOutbound::default()),
            access: Arc::new(AccessControl::new(vec![], Some(ADMIN), None)),
        }
    }

    pub fn context(&self, defaults: ChatSettings) -> WorkerContext {
        WorkerContext {
            store: Arc::clone(&self.store),
            text: self.backend.clone(),
            images: self.backend.clone(),
            outbound: self.outbound.clone(),
            access: Arc::clone(&self.access),
            machine: ConversationMachine::default(),
            defaults,
            backlog: ChatBacklog::new(16),
        }
    }
}

pub fn event_from(sender_id: i64, chat_id: i64, message_id: i32, text: &str) -> InboundEvent {
    InboundEvent::new(
        Sender {
            id: sender_id,
            display_name: "Grace Hopper".into(),
            username: Some("grace".into()),
        },
        chat_id,
        if chat_id > 0 {
            ChatType::Private
        } else {
            ChatType::Group
        },
        message_id,
        text,
    )
}
