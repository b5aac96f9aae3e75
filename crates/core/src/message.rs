// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message model, inbound sanitizer, and topic routing.

use crate::app::ApplicationId;
use thiserror::Error;

/// Root of the MQTT topic space.
pub const MESSAGE_HEADER: &str = "margot";

/// Sentinel topic a sanitized-away message collapses to.
pub const ERROR_TOPIC: &str = "margot/error";

/// Synthetic topic the transport enqueues when the broker connection drops.
pub const DISCONNECT_TOPIC: &str = "$disconnect$";

const TOPIC_CHARSET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ01234567890_/^";
const PAYLOAD_CHARSET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ01234567890_ -.,@<>=;()^*+";

/// One pub/sub message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }

    pub fn disconnect(cause: impl Into<String>) -> Self {
        Self::new(DISCONNECT_TOPIC, cause)
    }

    pub fn is_disconnect(&self) -> bool {
        self.topic == DISCONNECT_TOPIC
    }
}

/// Whitelist every inbound message before it enters the inbox. A message
/// carrying any character outside the allowed sets collapses to the error
/// sentinel; the caller is expected to log the event. Returns `false` when
/// the message was rewritten.
pub fn sanitize(message: &mut Message) -> bool {
    let topic_ok = message.topic.chars().all(|c| TOPIC_CHARSET.contains(c));
    let payload_ok = message.payload.chars().all(|c| PAYLOAD_CHARSET.contains(c));

    if topic_ok && payload_ok {
        return true;
    }

    message.topic = ERROR_TOPIC.to_string();
    message.payload.clear();
    false
}

/// What a topic's second-to-last segment says the message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    System,
    Welcome,
    Info,
    Observation,
    Kia,
    Error,
}

impl MessageKind {
    fn resolve(segment: &str) -> Option<Self> {
        match segment {
            "system" => Some(Self::System),
            "welcome" => Some(Self::Welcome),
            "info" => Some(Self::Info),
            "observation" => Some(Self::Observation),
            "kia" => Some(Self::Kia),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("topic '{0}' has too few segments")]
    BadTopic(String),

    #[error("unknown message kind '{kind}' in topic '{topic}'")]
    UnknownKind { topic: String, kind: String },

    #[error(transparent)]
    BadApplicationId(#[from] crate::app::ParseIdError),

    #[error("observation payload '{0}' is not sec@ns@body")]
    BadObservationPayload(String),
}

/// A fully decoded inbound message, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedMessage {
    /// Operator or peer-worker command on `margot/system/<id>`.
    System { sender: String, payload: String },
    /// New client (payload may carry the block description).
    Welcome { app_id: ApplicationId, client_id: String, payload: String },
    /// Legacy description lines.
    Info { app_id: ApplicationId, client_id: String, payload: String },
    /// Runtime observation, payload pre-split into timestamps and body.
    Observation {
        app_id: ApplicationId,
        client_id: String,
        seconds: i64,
        nanoseconds: i64,
        body: String,
    },
    /// Client died (last will) or said goodbye.
    Kia { app_id: ApplicationId, client_id: String, reason: String },
    /// Sanitizer sentinel: log and drop.
    Error { payload: String },
    /// Transport lost the broker connection.
    Disconnect { cause: String },
}

impl RoutedMessage {
    /// Decode a sanitized inbound message. Topic shape is
    /// `margot/<name>^<block>^<version>/<kind>/<client_id>` with the system
    /// channel (`margot/system/<id>`) and the sentinels as exceptions.
    pub fn decode(message: &Message) -> Result<Self, RouteError> {
        if message.is_disconnect() {
            return Ok(Self::Disconnect { cause: message.payload.clone() });
        }
        if message.topic == ERROR_TOPIC {
            return Ok(Self::Error { payload: message.payload.clone() });
        }

        let segments: Vec<&str> = message.topic.split('/').collect();
        if segments.len() < 3 {
            return Err(RouteError::BadTopic(message.topic.clone()));
        }

        let client_id = segments[segments.len() - 1].to_string();
        let kind_segment = segments[segments.len() - 2];
        let kind = MessageKind::resolve(kind_segment).ok_or_else(|| RouteError::UnknownKind {
            topic: message.topic.clone(),
            kind: kind_segment.to_string(),
        })?;

        if kind == MessageKind::System {
            return Ok(Self::System { sender: client_id, payload: message.payload.clone() });
        }

        let app_id = ApplicationId::parse(segments[1])?;
        match kind {
            MessageKind::Welcome => {
                Ok(Self::Welcome { app_id, client_id, payload: message.payload.clone() })
            }
            MessageKind::Info => {
                Ok(Self::Info { app_id, client_id, payload: message.payload.clone() })
            }
            MessageKind::Kia => {
                Ok(Self::Kia { app_id, client_id, reason: message.payload.clone() })
            }
            MessageKind::Observation => {
                let (seconds, nanoseconds, body) = split_observation(&message.payload)?;
                Ok(Self::Observation { app_id, client_id, seconds, nanoseconds, body })
            }
            MessageKind::Error => Ok(Self::Error { payload: message.payload.clone() }),
            MessageKind::System => unreachable!("system handled above"),
        }
    }
}

/// Pre-split an observation payload into `(sec, ns, body)`. The body keeps
/// its own `@` separators for the handler to interpret against the block
/// description.
fn split_observation(payload: &str) -> Result<(i64, i64, String), RouteError> {
    let mut parts = payload.splitn(3, '@');
    let bad = || RouteError::BadObservationPayload(payload.to_string());

    let seconds = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let nanoseconds = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let body = parts.next().ok_or_else(bad)?.to_string();
    Ok((seconds, nanoseconds, body))
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
