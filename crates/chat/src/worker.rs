//! Fixed-size pool of workers draining the dispatch queue.

use std::sync::Arc;

use {
    chatbridge_channels::{ChannelOutbound, InboundEvent},
    chatbridge_config::BotConfig,
    chatbridge_providers::{ImageBackend, TextBackend},
    chatbridge_sessions::{ChatSettings, ChatStore, Conversation},
    chrono::Utc,
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
};

use crate::{
    access::AccessControl,
    backlog::{ChatBacklog, Claim},
    machine::{AdminAction, BackendCall, BackendOutput, ConversationMachine, Reply, TurnContext},
    prompts::BACKEND_FAILURE,
    queue::DispatchReceiver,
};

/// Settings stamped on new conversations, taken from the loaded config.
#[must_use]
pub fn chat_settings(config: &BotConfig) -> ChatSettings {
    ChatSettings {
        temperature: config.chat.temperature,
        model: config.chat.model.clone(),
        max_messages: config.max_messages,
        use_markdown: config.chat.use_markdown,
        system_prompt: config.chat.system_prompt.clone(),
    }
}

/// Everything a worker needs, shared by the whole pool.
pub struct WorkerContext {
    pub store: Arc<dyn ChatStore>,
    pub text: Arc<dyn TextBackend>,
    pub images: Arc<dyn ImageBackend>,
    pub outbound: Arc<dyn ChannelOutbound>,
    pub access: Arc<AccessControl>,
    pub machine: ConversationMachine,
    /// Settings stamped on conversations created by a worker.
    pub defaults: ChatSettings,
    /// Chat ownership shared by the pool's workers.
    pub backlog: ChatBacklog,
}

impl WorkerContext {
    /// Process one event end to end: load, apply, call the backend, persist,
    /// reply. Never fails; every error is logged and answered.
    ///
    /// The caller must own the event's chat; [`WorkerPool`] workers do.
    pub async fn handle_event(&self, event: InboundEvent) {
        let chat_id = event.chat_id;
        let now = Utc::now();

        let mut conv = match self.store.get_or_create(chat_id, &self.defaults, now).await {
            Ok((conv, _)) => conv,
            Err(e) => {
                error!(chat_id, error = %e, "failed to load chat state");
                self.notify_admin(&format!("Failed to load state of chat {chat_id}: {e}"))
                    .await;
                self.send(&event, vec![Reply::plain(BACKEND_FAILURE)]).await;
                return;
            },
        };

        let ctx = TurnContext {
            now,
            privileged: self.access.is_admin(event.sender.id).await,
        };
        let step = self.machine.apply(&mut conv, &event, ctx);
        let mut replies = step.replies;
        let mut dirty = step.dirty;

        if let Some(action) = step.admin {
            replies.push(self.run_admin(action, event.sender.id).await);
        }

        if let Some(call) = step.call {
            match self.call_backend(&call).await {
                Ok(output) => replies.extend(self.machine.complete(&mut conv, &call, output)),
                Err(e) => {
                    warn!(
                        chat_id,
                        error = %e,
                        transient = e.is_transient(),
                        "backend call failed"
                    );
                    replies = vec![Reply::plain(BACKEND_FAILURE)];
                    dirty = false;
                },
            }
        }

        if dirty {
            self.persist(&conv).await;
        }
        self.send(&event, replies).await;
    }

    async fn call_backend(&self, call: &BackendCall) -> chatbridge_providers::Result<BackendOutput> {
        match call {
            BackendCall::Chat(request) | BackendCall::Text(request) => {
                debug!(model = %request.model, backend = self.text.name(), "calling text backend");
                self.text
                    .complete(request.clone())
                    .await
                    .map(BackendOutput::Text)
            },
            BackendCall::Image { prompt } => self
                .images
                .generate_image(prompt)
                .await
                .map(BackendOutput::Image),
        }
    }

    async fn run_admin(&self, action: AdminAction, sender_id: i64) -> Reply {
        info!(sender_id, ?action, "admin command");
        let result = match action {
            AdminAction::AddUser(id) => self.access.add_user(id).await.map(|c| c.describe()),
            AdminAction::RemoveUser(id) => self.access.remove_user(id).await.map(|c| c.describe()),
            AdminAction::Reload => self
                .access
                .reload()
                .await
                .map(|config| format!("Config reloaded:\n{}", config.summary())),
        };
        match result {
            Ok(text) => Reply::plain(text),
            Err(e) => {
                error!(sender_id, ?action, error = %e, "admin command failed");
                Reply::plain(format!("Could not apply the change: {e}"))
            },
        }
    }

    async fn persist(&self, conv: &Conversation) {
        if let Err(e) = self.store.set(conv.chat_id, conv).await {
            error!(chat_id = conv.chat_id, error = %e, "failed to persist chat state");
            self.notify_admin(&format!(
                "Failed to persist state of chat {}: {e}",
                conv.chat_id
            ))
            .await;
        }
    }

    async fn send(&self, event: &InboundEvent, replies: Vec<Reply>) {
        for reply in replies {
            let result = match &reply {
                Reply::Text { text, markdown } => {
                    self.outbound
                        .reply(event.chat_id, Some(event.message_id), text, *markdown)
                        .await
                },
                Reply::Image(image) => {
                    self.outbound
                        .send_image(event.chat_id, Some(event.message_id), image)
                        .await
                },
            };
            if let Err(e) = result {
                warn!(chat_id = event.chat_id, error = %e, "failed to send reply");
            }
        }
    }

    async fn notify_admin(&self, text: &str) {
        let Some(admin) = self.access.admin().await else {
            return;
        };
        if let Err(e) = self.outbound.notify(admin, text).await {
            warn!(admin, error = %e, "failed to notify administrator");
        }
    }
}

/// Handles of the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers (at least one) draining `queue`.
    ///
    /// A worker that takes an event for a free chat keeps that chat until its
    /// backlog is empty. Events for a chat owned by another worker are parked
    /// and the worker moves on to the next event.
    pub fn spawn(size: usize, queue: DispatchReceiver, ctx: Arc<WorkerContext>) -> Self {
        let handles = (0..size.max(1))
            .map(|worker| {
                let queue = queue.clone();
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    debug!(worker, "worker started");
                    while let Some(claim) = queue.dequeue_claimed(&ctx.backlog).await {
                        let event = match claim {
                            Claim::Owned(event) => event,
                            Claim::Parked(chat_id) => {
                                debug!(worker, chat_id, "chat busy, event parked for its owner");
                                continue;
                            },
                        };
                        let chat_id = event.chat_id;
                        let mut next = Some(event);
                        while let Some(event) = next {
                            debug!(
                                worker,
                                chat_id,
                                command = event.command.as_ref().map(|c| c.name.as_str()),
                                "processing event"
                            );
                            ctx.handle_event(event).await;
                            next = ctx.backlog.next(chat_id);
                        }
                    }
                    debug!(worker, "worker stopped");
                })
            })
            .collect();
        Self { handles }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to finish. Workers exit once the queue is
    /// closed and drained and the chats they own have no backlog left.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker panicked");
            }
        }
    }
}
