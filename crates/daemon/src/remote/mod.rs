// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub transport: the handler trait, the shared inbox, and the MQTT
//! implementation.

pub mod mqtt;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use agora_core::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("unable to reach the broker: {0}")]
    Connection(String),

    #[error("publish on '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("subscription change on '{topic}' failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("transport is disconnected")]
    Disconnected,
}

/// One long-lived connection to the broker.
///
/// Receiving happens through the shared inbox: the transport's event-loop
/// task does nothing but sanitize and enqueue, workers drain with
/// `recv_message`. `recv_message` returns `None` only when the handler is
/// shutting down.
#[async_trait::async_trait]
pub trait RemoteHandler: Send + Sync {
    async fn send_message(&self, message: Message) -> Result<(), RemoteError>;

    async fn recv_message(&self) -> Option<Message>;

    async fn subscribe(&self, topic: &str) -> Result<(), RemoteError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), RemoteError>;

    /// Publish the goodbye message, tear the connection down, and wake every
    /// worker blocked in `recv_message`.
    async fn disconnect(&self);

    fn client_id(&self) -> &str;
}

/// MPMC queue of inbound messages.
///
/// Unbounded in practice: the broker's flow control is the only back
/// pressure, matching the original design. Closing wakes all waiters and
/// makes every subsequent `pop` return `None`.
#[derive(Debug, Default)]
pub struct Inbox {
    queue: parking_lot::Mutex<VecDeque<Message>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue one message and wake a waiter. Messages pushed after `close`
    /// are dropped.
    pub fn push(&self, message: Message) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.queue.lock().push_back(message);
        self.notify.notify_one();
    }

    /// Dequeue the next message, waiting if the inbox is empty. `None` means
    /// the inbox was closed and drained.
    pub async fn pop(&self) -> Option<Message> {
        loop {
            // register interest before checking, so a push between the check
            // and the await still wakes us
            let notified = self.notify.notified();

            if let Some(message) = self.queue.lock().pop_front() {
                // pass the wakeup on: there may be more messages than wakers
                self.notify.notify_one();
                return Some(message);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            notified.await;
        }
    }

    /// Terminate: wake every waiter. Queued messages are still drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
