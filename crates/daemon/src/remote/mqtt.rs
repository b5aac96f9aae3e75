// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT transport over rumqttc.

use super::{Inbox, RemoteError, RemoteHandler};
use agora_core::{sanitize, Message, MESSAGE_HEADER};
use rumqttc::{
    AsyncClient, Event, LastWill, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct RemoteConfiguration {
    /// Name this process announces itself as (the last-will topic is
    /// `margot/<name>/kia`).
    pub application_name: String,
    /// `host:port` of the broker.
    pub broker_url: String,
    /// Quality of service for every subscription and publish: 0, 1 or 2.
    pub qos: u8,
    pub username: String,
    pub password: String,
    pub broker_ca: Option<PathBuf>,
    pub client_certificate: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

impl RemoteConfiguration {
    pub fn new(application_name: impl Into<String>, broker_url: impl Into<String>, qos: u8) -> Self {
        Self {
            application_name: application_name.into(),
            broker_url: broker_url.into(),
            qos,
            username: String::new(),
            password: String::new(),
            broker_ca: None,
            client_certificate: None,
            client_key: None,
        }
    }
}

/// The rumqttc-backed transport. The event-loop task owns receiving; its
/// only job is to sanitize and enqueue into the shared inbox, or to enqueue
/// the synthetic disconnect message when the connection drops.
pub struct MqttHandler {
    client: AsyncClient,
    inbox: Arc<Inbox>,
    stopped: Arc<AtomicBool>,
    connected: AtomicBool,
    client_id: String,
    goodbye_topic: String,
    qos: QoS,
}

impl MqttHandler {
    /// Connect to the broker and start the receive loop.
    pub fn connect(config: &RemoteConfiguration) -> Result<Arc<Self>, RemoteError> {
        let client_id = build_client_id();
        let (host, port) = split_broker_url(&config.broker_url)?;
        let qos = map_qos(config.qos)?;
        let goodbye_topic = format!("{MESSAGE_HEADER}/{}/kia", config.application_name);

        let mut options = MqttOptions::new(client_id.clone(), host, port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(&goodbye_topic, client_id.clone(), qos, false));

        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.password);
        }

        if let Some(ca_path) = &config.broker_ca {
            let ca = read_pem(ca_path)?;
            let client_auth = match (&config.client_certificate, &config.client_key) {
                (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
                _ => None,
            };
            options.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth,
            }));
        }

        let (client, mut event_loop) = AsyncClient::new(options, 64);
        let inbox = Arc::new(Inbox::new());
        let stopped = Arc::new(AtomicBool::new(false));

        let handler = Arc::new(Self {
            client,
            inbox: Arc::clone(&inbox),
            stopped: Arc::clone(&stopped),
            connected: AtomicBool::new(true),
            client_id,
            goodbye_topic,
            qos,
        });

        tokio::spawn(async move {
            loop {
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload).to_string();
                        let mut message = Message::new(publish.topic, payload);
                        if !sanitize(&mut message) {
                            warn!("input sanitizer: invalid character, message discarded");
                        } else {
                            trace!(topic = %message.topic, "received message");
                        }
                        inbox.push(message);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if stopped.load(Ordering::Acquire) {
                            break;
                        }
                        warn!("lost connection with broker: {e}");
                        inbox.push(Message::disconnect(e.to_string()));
                        // rumqttc reconnects on the next poll; pace the retries
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }
            debug!("mqtt receive loop terminated");
        });

        Ok(handler)
    }
}

#[async_trait::async_trait]
impl RemoteHandler for MqttHandler {
    async fn send_message(&self, message: Message) -> Result<(), RemoteError> {
        if !self.connected.load(Ordering::Acquire) {
            warn!("attempt to send a message while disconnected");
            return Err(RemoteError::Disconnected);
        }
        trace!(topic = %message.topic, "sending message");
        self.client
            .publish(&message.topic, self.qos, false, message.payload.into_bytes())
            .await
            .map_err(|e| RemoteError::PublishFailed { topic: message.topic, reason: e.to_string() })
    }

    async fn recv_message(&self) -> Option<Message> {
        self.inbox.pop().await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), RemoteError> {
        self.client.subscribe(topic, self.qos).await.map_err(|e| {
            RemoteError::SubscribeFailed { topic: topic.to_string(), reason: e.to_string() }
        })?;
        trace!(topic, "subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), RemoteError> {
        self.client.unsubscribe(topic).await.map_err(|e| {
            RemoteError::SubscribeFailed { topic: topic.to_string(), reason: e.to_string() }
        })?;
        trace!(topic, "unsubscribed");
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            // explicit goodbye: the broker only fires the last will on an
            // unclean drop
            let goodbye = Message::new(self.goodbye_topic.clone(), self.client_id.clone());
            if let Err(e) = self
                .client
                .publish(&goodbye.topic, self.qos, false, goodbye.payload.into_bytes())
                .await
            {
                warn!("unable to publish the goodbye message: {e}");
            }

            self.stopped.store(true, Ordering::Release);
            if let Err(e) = self.client.disconnect().await {
                warn!("unable to disconnect from the broker properly: {e}");
            }
        }
        self.inbox.close();
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Unique-ish client id in the network: `<hostname>_<pid>` with problematic
/// characters mapped to underscores.
fn build_client_id() -> String {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "agora".to_string());
    format!("{hostname}_{}", std::process::id()).replace(['.', '-'], "_")
}

fn split_broker_url(url: &str) -> Result<(String, u16), RemoteError> {
    let (host, port) = url.rsplit_once(':').unwrap_or((url, "1883"));
    let port = port
        .parse()
        .map_err(|_| RemoteError::Connection(format!("invalid broker url '{url}'")))?;
    Ok((host.to_string(), port))
}

fn map_qos(qos: u8) -> Result<QoS, RemoteError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(RemoteError::Connection(format!("invalid qos level {other}"))),
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, RemoteError> {
    std::fs::read(path)
        .map_err(|e| RemoteError::Connection(format!("unable to read '{}': {e}", path.display())))
}
