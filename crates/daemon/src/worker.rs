// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool: cooperative tasks draining the transport inbox and
//! dispatching each message to the right application handler.

use crate::manager::ApplicationManager;
use agora_core::{Message, RoutedMessage, MESSAGE_HEADER};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// N cooperative workers; each one loops on `recv_message` until the
/// transport shuts down.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(manager: Arc<ApplicationManager>, workers: usize) -> Self {
        let handles = (0..workers)
            .map(|index| {
                let worker = Worker::new(format!("worker-{index}"), Arc::clone(&manager));
                tokio::spawn(worker.run())
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait until every worker has retired.
    pub async fn wait(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

struct Worker {
    name: String,
    manager: Arc<ApplicationManager>,
}

impl Worker {
    fn new(name: String, manager: Arc<ApplicationManager>) -> Self {
        Self { name, manager }
    }

    async fn run(self) {
        debug!(worker = %self.name, "on duty");
        let remote = self.manager.remote();

        while let Some(message) = remote.recv_message().await {
            self.handle_message(message).await;
        }

        debug!(worker = %self.name, "on retirement");
    }

    async fn handle_message(&self, message: Message) {
        let routed = match RoutedMessage::decode(&message) {
            Ok(routed) => routed,
            Err(e) => {
                warn!(worker = %self.name, "received an undeliverable message: {e}");
                return;
            }
        };

        match routed {
            RoutedMessage::System { sender, payload } => {
                self.handle_system(&sender, &payload).await;
            }
            RoutedMessage::Welcome { app_id, client_id, payload } => {
                trace!(worker = %self.name, app = %app_id, client = %client_id, "welcome");
                let handler = self.manager.get_handler(&app_id);
                handler.welcome_client(&client_id, &payload).await;
            }
            RoutedMessage::Info { app_id, client_id, payload } => {
                trace!(worker = %self.name, app = %app_id, client = %client_id, "info");
                let handler = self.manager.get_handler(&app_id);
                handler.welcome_client(&client_id, &payload).await;
            }
            RoutedMessage::Observation { app_id, client_id, seconds, nanoseconds, body } => {
                trace!(worker = %self.name, app = %app_id, client = %client_id, "observation");
                let handler = self.manager.get_handler(&app_id);
                handler.process_observation(&client_id, seconds, nanoseconds, &body).await;
            }
            RoutedMessage::Kia { app_id, client_id, reason } => {
                trace!(worker = %self.name, app = %app_id, client = %client_id, reason = %reason, "kia");
                let handler = self.manager.get_handler(&app_id);
                handler.bye_client(&client_id);
            }
            RoutedMessage::Error { payload } => {
                warn!(worker = %self.name, "error message -> {payload}, ignoring it");
            }
            RoutedMessage::Disconnect { cause } => {
                // the transport owns reconnection; handlers observe the gap
                warn!(worker = %self.name, "connection with the broker lost: {cause}");
            }
        }
    }

    /// System payloads are `type[@optional_message]`.
    async fn handle_system(&self, sender: &str, payload: &str) {
        let mut tokens = payload.split('@');
        let command = tokens.next().unwrap_or_default();

        match command {
            "shutdown" => {
                info!(worker = %self.name, "shutdown requested, notifying the other workers");
                let remote = self.manager.remote();
                let _ = remote
                    .send_message(Message::new(
                        format!("{MESSAGE_HEADER}/system/{}", self.name),
                        "shutdown",
                    ))
                    .await;
                remote.disconnect().await;
            }
            "test" => {
                let client_message = tokens.next().unwrap_or_default();
                info!(
                    worker = %self.name,
                    "test connection: received {{{client_message}}} from client [{sender}]"
                );
                let _ = self
                    .manager
                    .remote()
                    .send_message(Message::new(
                        format!("{MESSAGE_HEADER}/{sender}/test"),
                        format!("Hello from server {sender}"),
                    ))
                    .await;
            }
            other => {
                warn!(worker = %self.name, "invalid system command: {other}");
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
