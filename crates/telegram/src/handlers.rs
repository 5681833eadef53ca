use {
    chatbridge_channels::{ChatType, InboundEvent, Sender},
    teloxide::types::{Message, User},
};

/// Map a Telegram message onto an inbound event.
///
/// Returns `None` for updates the engine has nothing to do with: messages
/// without text, anonymous senders, and other bots.
pub fn inbound_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let user = msg.from.as_ref().filter(|u| !u.is_bot)?;
    let sender_id = i64::try_from(user.id.0).ok()?;

    let chat_type = if msg.chat.is_private() {
        ChatType::Private
    } else {
        ChatType::Group
    };

    Some(InboundEvent::new(
        Sender {
            id: sender_id,
            display_name: display_name(user),
            username: user.username.clone(),
        },
        msg.chat.id.0,
        chat_type,
        msg.id.0,
        text,
    ))
}

fn display_name(user: &User) -> String {
    match &user.last_name {
        Some(last) if !last.is_empty() => format!("{} {last}", user.first_name),
        _ => user.first_name.clone(),
    }
}
