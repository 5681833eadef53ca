//! Platform-neutral admission of inbound events.

use std::sync::Arc;

use {
    chatbridge_channels::{ChannelOutbound, InboundEvent},
    chatbridge_sessions::{ChatSettings, ChatStore},
    chrono::Utc,
    tracing::{debug, warn},
};

use crate::{
    access::AccessControl,
    error::Result,
    prompts::ACCESS_DENIED,
    queue::DispatchSender,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Enqueued,
    Rejected,
}

/// Gate, resolve and enqueue. Called by the platform polling loop, one event
/// at a time.
pub struct Ingress {
    pub access: Arc<AccessControl>,
    pub store: Arc<dyn ChatStore>,
    pub outbound: Arc<dyn ChannelOutbound>,
    pub defaults: ChatSettings,
    pub queue: DispatchSender,
}

impl Ingress {
    /// Admit one event. Waits while the dispatch queue is full; fails only
    /// when the queue has been closed.
    pub async fn admit(&self, event: InboundEvent) -> Result<Admission> {
        if let Err(reason) = self.access.check(&event.sender).await {
            warn!(
                sender_id = event.sender.id,
                chat_id = event.chat_id,
                %reason,
                "rejected inbound message"
            );
            if event.is_private() {
                self.reject(&event).await;
            }
            return Ok(Admission::Rejected);
        }

        match self
            .store
            .get_or_create(event.chat_id, &self.defaults, Utc::now())
            .await
        {
            Ok((_, true)) => debug!(chat_id = event.chat_id, "created conversation"),
            Ok((_, false)) => {},
            Err(e) => warn!(chat_id = event.chat_id, error = %e, "failed to resolve chat state"),
        }

        if self.queue.available() == 0 {
            debug!(chat_id = event.chat_id, "dispatch queue full, waiting for a worker");
        }
        self.queue.enqueue(event).await?;
        Ok(Admission::Enqueued)
    }

    async fn reject(&self, event: &InboundEvent) {
        if let Err(e) = self
            .outbound
            .reply(event.chat_id, Some(event.message_id), ACCESS_DENIED, false)
            .await
        {
            warn!(chat_id = event.chat_id, error = %e, "failed to send rejection");
        }

        let Some(admin) = self.access.admin().await else {
            return;
        };
        let notice = format!("Unauthorized access attempt by user {}", event.sender);
        if let Err(e) = self.outbound.notify(admin, &notice).await {
            warn!(admin, error = %e, "failed to notify administrator");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            queue::dispatch_queue,
            testing::{ADMIN, RecordingOutbound, Sent, event_from},
        },
        chatbridge_sessions::MemoryChatStore,
    };

    fn ingress(
        allow_list: Vec<i64>,
        admin: Option<i64>,
    ) -> (Ingress, Arc<RecordingOutbound>, crate::queue::DispatchReceiver) {
        let outbound = Arc::new(RecordingOutbound::default());
        let (tx, rx) = dispatch_queue(10);
        let ingress = Ingress {
            access: Arc::new(AccessControl::new(allow_list, admin, None)),
            store: Arc::new(MemoryChatStore::new()),
            outbound: outbound.clone(),
            defaults: ChatSettings::default(),
            queue: tx,
        };
        (ingress, outbound, rx)
    }

    #[tokio::test]
    async fn public_mode_enqueues_and_creates_chat() {
        let (ingress, outbound, rx) = ingress(vec![], None);

        let admission = ingress.admit(event_from(5, 100, 1, "hi")).await.unwrap();

        assert_eq!(admission, Admission::Enqueued);
        assert_eq!(rx.dequeue().await.unwrap().message_id, 1);
        assert!(ingress.store.get(100).await.unwrap().is_some());
        assert!(outbound.sent().is_empty());
    }

    #[tokio::test]
    async fn private_rejection_replies_and_notifies_admin() {
        let (ingress, outbound, _rx) = ingress(vec![ADMIN], Some(ADMIN));

        let admission = ingress.admit(event_from(5, 100, 4, "hi")).await.unwrap();

        assert_eq!(admission, Admission::Rejected);
        let sent = outbound.sent();
        assert_eq!(sent[0], Sent::Reply {
            chat_id: 100,
            reply_to: Some(4),
            text: ACCESS_DENIED.into(),
            rich: false,
        });
        let Sent::Notify { target, text } = &sent[1] else {
            panic!("expected admin notification, got {sent:?}");
        };
        assert_eq!(*target, ADMIN);
        assert!(text.contains("Grace Hopper (5) @grace"));
        assert!(ingress.store.get(100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn group_rejection_is_silent() {
        let (ingress, outbound, _rx) = ingress(vec![ADMIN], Some(ADMIN));

        let admission = ingress.admit(event_from(5, -100, 1, "hi")).await.unwrap();

        assert_eq!(admission, Admission::Rejected);
        assert!(outbound.sent().is_empty());
    }

    #[tokio::test]
    async fn rejection_without_admin_only_replies() {
        let (ingress, outbound, _rx) = ingress(vec![2], None);
        ingress.admit(event_from(5, 100, 1, "hi")).await.unwrap();
        assert_eq!(outbound.sent().len(), 1);
    }

    #[tokio::test]
    async fn closed_queue_is_an_error() {
        let (ingress, _outbound, rx) = ingress(vec![], None);
        drop(rx);
        assert!(ingress.admit(event_from(5, 100, 1, "hi")).await.is_err());
    }
}
