//! Bounded FIFO between the ingress loop and the worker pool.

use std::sync::Arc;

use {
    chatbridge_channels::InboundEvent,
    tokio::sync::{Mutex, mpsc},
};

use crate::{
    backlog::{ChatBacklog, Claim},
    error::{Error, Result},
};

/// Create a dispatch queue holding at most `capacity` buffered events.
pub fn dispatch_queue(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DispatchSender { tx },
        DispatchReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half. Dropping every clone closes the queue.
#[derive(Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<InboundEvent>,
}

impl DispatchSender {
    /// Wait for a free slot, then buffer `event`.
    pub async fn enqueue(&self, event: InboundEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::QueueClosed)
    }

    /// Number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer half, shared by every worker. Each event is delivered to exactly
/// one caller of [`DispatchReceiver::dequeue`].
#[derive(Clone)]
pub struct DispatchReceiver {
    rx: Arc<Mutex<mpsc::Receiver<InboundEvent>>>,
}

impl DispatchReceiver {
    /// Wait for the next event. Returns `None` once the queue is closed and
    /// drained.
    pub async fn dequeue(&self) -> Option<InboundEvent> {
        self.rx.lock().await.recv().await
    }

    /// Wait for the next event and claim its chat in `backlog` before any
    /// other worker can dequeue, so each chat's events reach their owner in
    /// arrival order.
    pub async fn dequeue_claimed(&self, backlog: &ChatBacklog) -> Option<Claim> {
        let mut rx = self.rx.lock().await;
        let event = rx.recv().await?;
        Some(backlog.claim(event).await)
    }
}
