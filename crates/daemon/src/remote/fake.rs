// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process transport for tests: records what the server publishes and
//! lets tests inject inbound traffic through the same sanitizer the real
//! transport applies.

use super::{Inbox, RemoteError, RemoteHandler};
use agora_core::{sanitize, Message};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

#[derive(Default)]
pub struct FakeRemote {
    inbox: Inbox,
    sent: Mutex<Vec<Message>>,
    subscriptions: Mutex<Vec<String>>,
    client_id: String,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { client_id: "fake_remote_1".to_string(), ..Self::default() })
    }

    /// Inject an inbound message as if the broker delivered it.
    pub fn inject(&self, message: Message) {
        let mut message = message;
        if !sanitize(&mut message) {
            warn!("input sanitizer: invalid character, message discarded");
        }
        self.inbox.push(message);
    }

    /// Inject bypassing the sanitizer (for the synthetic sentinels).
    pub fn inject_raw(&self, message: Message) {
        self.inbox.push(message);
    }

    /// Everything the server published so far, oldest first.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Drain the published messages.
    pub fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut self.sent.lock())
    }

    /// Published messages whose topic matches a predicate.
    pub fn sent_on(&self, topic: &str) -> Vec<Message> {
        self.sent.lock().iter().filter(|m| m.topic == topic).cloned().collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    pub fn close(&self) {
        self.inbox.close();
    }
}

#[async_trait::async_trait]
impl RemoteHandler for FakeRemote {
    async fn send_message(&self, message: Message) -> Result<(), RemoteError> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn recv_message(&self) -> Option<Message> {
        self.inbox.pop().await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), RemoteError> {
        self.subscriptions.lock().push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), RemoteError> {
        self.subscriptions.lock().retain(|t| t != topic);
        Ok(())
    }

    async fn disconnect(&self) {
        self.inbox.close();
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}
