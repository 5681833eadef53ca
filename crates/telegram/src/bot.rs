use std::{sync::Arc, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use chatbridge_chat::{Admission, Ingress, command_menu};

use crate::{
    error::{Error, Result},
    handlers,
};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build the bot client, verify the token and register the command menu.
///
/// `configured_menu` is the optional list of command names to advertise;
/// unknown names are ignored and an empty list advertises the defaults.
pub async fn connect(
    token: &Secret<String>,
    poll_timeout: u32,
    configured_menu: &[String],
) -> Result<Bot> {
    if token.expose_secret().trim().is_empty() {
        return Err(Error::message("telegram token is empty"));
    }

    // The HTTP timeout has to outlast the long-poll timeout, otherwise the
    // client aborts the request before Telegram answers.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(poll_timeout) + 15))
        .build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    let me = bot.get_me().await?;

    // Long polling does not work while a webhook is set.
    bot.delete_webhook().send().await?;

    let commands: Vec<BotCommand> = command_menu(configured_menu)
        .into_iter()
        .map(|(name, description)| BotCommand::new(name, description))
        .collect();
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");
    Ok(bot)
}

/// Long-poll for updates and hand every message to `ingress` until `cancel`
/// fires.
///
/// Admission waits while the dispatch queue is full, so the loop stops
/// fetching updates until workers catch up. The token is cancelled by the
/// loop itself when another instance takes over the bot or the queue closes.
pub fn start_polling(
    bot: Bot,
    poll_timeout: u32,
    ingress: Arc<Ingress>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(poll_timeout, "starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout)
                .allowed_updates(vec![AllowedUpdate::Message]);

            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        let UpdateKind::Message(msg) = update.kind else {
                            debug!("ignoring non-message update");
                            continue;
                        };
                        let Some(event) = handlers::inbound_event(&msg) else {
                            debug!(chat_id = msg.chat.id.0, "ignoring message without text");
                            continue;
                        };
                        match ingress.admit(event).await {
                            Ok(Admission::Enqueued) => {
                                debug!(chat_id = msg.chat.id.0, "message enqueued");
                            },
                            Ok(Admission::Rejected) => {},
                            Err(e) => {
                                error!(error = %e, "dispatch queue closed, stopping polling");
                                cancel.cancel();
                                break;
                            },
                        }
                    }
                    if cancel.is_cancelled() {
                        break;
                    }
                },
                Err(e) if is_conflict(&e) => {
                    warn!(
                        "telegram bot disabled: another instance is already running with this token"
                    );
                    cancel.cancel();
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                    }
                },
            }
        }

        info!("telegram polling stopped");
    })
}

fn is_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
