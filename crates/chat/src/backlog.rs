//! Single-owner scheduling of chats across the worker pool.

use std::{collections::VecDeque, sync::Arc};

use {
    chatbridge_channels::InboundEvent,
    chatbridge_sessions::ChatId,
    dashmap::{DashMap, mapref::entry::Entry},
    tokio::sync::{OwnedSemaphorePermit, Semaphore},
};

/// Outcome of handing a dequeued event to the [`ChatBacklog`].
#[derive(Debug)]
pub enum Claim {
    /// The chat was free and now belongs to the caller, who handles the
    /// event and then drains the chat's backlog.
    Owned(InboundEvent),
    /// Another worker owns the chat; the event waits in its backlog.
    Parked(ChatId),
}

/// Chats currently owned by a worker, each with the events that arrived
/// while its owner was busy.
///
/// A worker owns a chat from the moment it claims it until the chat's
/// backlog is empty, so a chat is never handled by two workers at once and
/// no worker waits on a busy chat. Every parked event holds one slot; once
/// all slots are taken, [`ChatBacklog::claim`] waits for an owner to free
/// one, which in turn stalls the dispatch queue and the ingress behind it.
pub struct ChatBacklog {
    chats: DashMap<ChatId, VecDeque<(InboundEvent, Option<OwnedSemaphorePermit>)>>,
    slots: Arc<Semaphore>,
}

impl ChatBacklog {
    /// Backlog holding at most `capacity` parked events across all chats.
    pub fn new(capacity: usize) -> Self {
        Self {
            chats: DashMap::new(),
            slots: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Take the event's chat if it is free, otherwise park the event behind
    /// the chat's owner.
    ///
    /// Claims must be made in dequeue order for a chat's events to be
    /// handled in arrival order; see [`crate::queue::DispatchReceiver::dequeue_claimed`].
    pub async fn claim(&self, event: InboundEvent) -> Claim {
        let chat_id = event.chat_id;
        let busy = match self.chats.entry(chat_id) {
            Entry::Vacant(free) => {
                free.insert(VecDeque::new());
                false
            },
            Entry::Occupied(_) => true,
        };
        if !busy {
            return Claim::Owned(event);
        }

        // The semaphore is never closed, so a permit is always granted.
        let slot = Arc::clone(&self.slots).acquire_owned().await.ok();

        match self.chats.entry(chat_id) {
            Entry::Occupied(mut owned) => {
                owned.get_mut().push_back((event, slot));
                Claim::Parked(chat_id)
            },
            // The owner drained the chat while we waited for a slot.
            Entry::Vacant(free) => {
                free.insert(VecDeque::new());
                Claim::Owned(event)
            },
        }
    }

    /// Next parked event of an owned chat. Returns `None` and releases the
    /// chat once its backlog is empty.
    pub fn next(&self, chat_id: ChatId) -> Option<InboundEvent> {
        match self.chats.entry(chat_id) {
            Entry::Occupied(mut owned) => match owned.get_mut().pop_front() {
                Some((event, _slot)) => Some(event),
                None => {
                    owned.remove();
                    None
                },
            },
            Entry::Vacant(_) => None,
        }
    }

    /// Number of chats currently owned by a worker.
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
