use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::{Result, bail},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use {
    chatbridge_channels::ChannelOutbound,
    chatbridge_chat::{
        AccessControl, ChatBacklog, ConversationMachine, Ingress, WorkerContext, WorkerPool,
        chat_settings, dispatch_queue,
    },
    chatbridge_config::{Severity, data_dir},
    chatbridge_providers::OpenAiProvider,
    chatbridge_sessions::{ChatStore, FileChatStore},
    chatbridge_telegram::{TelegramOutbound, connect, start_polling},
};

use crate::config_commands::{load_checked, resolve_config_path};

/// Wire the engine to Telegram and the backend, then run until Ctrl-C or
/// until polling stops on its own.
pub async fn run(config_path: Option<PathBuf>, data_dir_override: Option<PathBuf>) -> Result<()> {
    let path = resolve_config_path(config_path)?;
    let (mut config, report) = load_checked(&path)?;
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if report.has_errors() {
        bail!("invalid configuration in {}", path.display());
    }
    if let Some(dir) = data_dir_override {
        config.data_dir = Some(dir);
    }
    info!(config = %path.display(), "configuration loaded");

    let state_dir = data_dir(&config);
    let store: Arc<dyn ChatStore> = Arc::new(FileChatStore::new(&state_dir));
    info!(dir = %state_dir.display(), "chat state directory");

    let backend = Arc::new(OpenAiProvider::new(
        config.openai_token.clone(),
        config.openai_base_url.clone(),
        config.image.size.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let access = Arc::new(AccessControl::from_config(&config, Some(path.clone())));
    let defaults = chat_settings(&config);

    let bot = connect(
        &config.telegram_token,
        config.timeout_value,
        &config.command_menu,
    )
    .await?;
    let outbound: Arc<dyn ChannelOutbound> = Arc::new(TelegramOutbound::new(bot.clone()));

    let (queue, receiver) = dispatch_queue(config.dispatch.queue_capacity);
    let ctx = Arc::new(WorkerContext {
        store: Arc::clone(&store),
        text: backend.clone(),
        images: backend,
        outbound: Arc::clone(&outbound),
        access: Arc::clone(&access),
        machine: ConversationMachine::from_config(&config),
        defaults: defaults.clone(),
        backlog: ChatBacklog::new(config.dispatch.queue_capacity),
    });
    let pool = WorkerPool::spawn(config.dispatch.workers, receiver, ctx);
    info!(
        workers = pool.size(),
        queue_capacity = config.dispatch.queue_capacity,
        "worker pool started"
    );

    // The ingress owns the only queue sender, so the queue closes once the
    // polling task drops it.
    let ingress = Arc::new(Ingress {
        access,
        store,
        outbound,
        defaults,
        queue,
    });
    let cancel = CancellationToken::new();
    let polling = start_polling(bot, config.timeout_value, ingress, cancel.clone());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutdown requested");
        },
        () = cancel.cancelled() => warn!("polling stopped, shutting down"),
    }
    cancel.cancel();

    if let Err(e) = polling.await {
        error!(error = %e, "polling task failed");
    }
    info!("draining dispatch queue");
    pool.join().await;
    info!("all workers stopped");
    Ok(())
}
