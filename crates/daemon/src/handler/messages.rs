// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic construction and JSON payloads for the server→client direction.

use super::HandlerState;
use agora_core::{ApplicationId, Configuration, Message, MESSAGE_HEADER};

pub(crate) fn explore_topic(app_id: &ApplicationId, client_id: &str) -> String {
    format!("{MESSAGE_HEADER}/{app_id}/{client_id}/explore")
}

pub(crate) fn prediction_topic(app_id: &ApplicationId, client_id: &str) -> String {
    format!("{MESSAGE_HEADER}/{app_id}/{client_id}/prediction")
}

pub(crate) fn prediction_broadcast_topic(app_id: &ApplicationId) -> String {
    format!("{MESSAGE_HEADER}/{app_id}/prediction")
}

pub(crate) fn abort_topic(app_id: &ApplicationId, client_id: &str) -> String {
    format!("{MESSAGE_HEADER}/{app_id}/{client_id}/abort")
}

/// One configuration as the JSON object a client expects on `explore`.
pub(crate) fn configuration_to_json(configuration: &Configuration) -> String {
    serde_json::to_string(configuration).unwrap_or_else(|_| "{}".to_string())
}

/// Build the next `explore` message for a client, advancing the round-robin
/// cursor and the per-iteration send counter. `None` when the plan is empty
/// or the iteration budget is spent.
pub(crate) fn next_configuration(
    st: &mut HandlerState,
    app_id: &ApplicationId,
    client_id: &str,
) -> Option<Message> {
    if st.num_configurations_sent_per_iteration >= st.num_configurations_per_iteration {
        return None;
    }
    let (_, configuration) = st.doe.get_next()?;
    st.num_configurations_sent_per_iteration += 1;
    Some(Message::new(explore_topic(app_id, client_id), configuration_to_json(&configuration)))
}
