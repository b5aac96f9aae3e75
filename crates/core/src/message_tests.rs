// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn clean_messages_pass_unchanged() {
    let mut msg = Message::new("margot/app^blk^1/welcome/c1", "knob threads int32 1 2");
    assert!(sanitize(&mut msg));
    assert_eq!(msg.topic, "margot/app^blk^1/welcome/c1");
}

#[test]
fn bad_topic_character_collapses_to_error_sentinel() {
    let mut msg = Message::new("margot/app|blk/welcome/c1", "payload");
    assert!(!sanitize(&mut msg));
    assert_eq!(msg.topic, ERROR_TOPIC);
    assert!(msg.payload.is_empty());
}

#[test]
fn bad_payload_character_collapses_to_error_sentinel() {
    let mut msg = Message::new("margot/app^blk^1/observation/c1", "1@2@threads=1|oops");
    assert!(!sanitize(&mut msg));
    assert_eq!(msg.topic, ERROR_TOPIC);
    assert!(msg.payload.is_empty());
}

proptest! {
    /// Property 6: any out-of-whitelist character anywhere leaves only the
    /// error sentinel behind.
    #[test]
    fn sanitizer_never_lets_bad_characters_through(topic in "[ -~]{0,40}", payload in "[ -~]{0,40}") {
        let mut msg = Message::new(topic, payload);
        sanitize(&mut msg);
        prop_assert!(
            msg.topic == ERROR_TOPIC
                || msg
                    .topic
                    .chars()
                    .chain(msg.payload.chars())
                    .all(|c| c.is_ascii_alphanumeric()
                        || "_/^".contains(c)
                        || " -.,@<>=;()*+".contains(c))
        );
    }
}

#[test]
fn decodes_welcome() {
    let msg = Message::new("margot/app^blk^1/welcome/c1", "knob threads int32 1");
    let routed = RoutedMessage::decode(&msg).unwrap();
    assert_eq!(
        routed,
        RoutedMessage::Welcome {
            app_id: ApplicationId::new("app", "blk", "1"),
            client_id: "c1".into(),
            payload: "knob threads int32 1".into(),
        }
    );
}

#[test]
fn decodes_observation_with_pre_split_timestamps() {
    let msg = Message::new("margot/app^blk^1/observation/c1", "12@500@@threads=1@latency=3.5");
    match RoutedMessage::decode(&msg).unwrap() {
        RoutedMessage::Observation { seconds, nanoseconds, body, client_id, .. } => {
            assert_eq!(seconds, 12);
            assert_eq!(nanoseconds, 500);
            assert_eq!(body, "@threads=1@latency=3.5");
            assert_eq!(client_id, "c1");
        }
        other => panic!("unexpected decode: {other:?}"),
    }
}

#[test]
fn rejects_observation_without_timestamps() {
    let msg = Message::new("margot/app^blk^1/observation/c1", "notanumber@2@x");
    assert!(matches!(
        RoutedMessage::decode(&msg),
        Err(RouteError::BadObservationPayload(_))
    ));
}

#[test]
fn decodes_system_without_application_id() {
    let msg = Message::new("margot/system/operator", "shutdown");
    assert_eq!(
        RoutedMessage::decode(&msg).unwrap(),
        RoutedMessage::System { sender: "operator".into(), payload: "shutdown".into() }
    );
}

#[test]
fn decodes_kia_with_reason() {
    let msg = Message::new("margot/app^blk^1/kia/c1", "c1");
    assert_eq!(
        RoutedMessage::decode(&msg).unwrap(),
        RoutedMessage::Kia {
            app_id: ApplicationId::new("app", "blk", "1"),
            client_id: "c1".into(),
            reason: "c1".into(),
        }
    );
}

#[test]
fn decodes_sentinels() {
    assert_eq!(
        RoutedMessage::decode(&Message::new(ERROR_TOPIC, "")).unwrap(),
        RoutedMessage::Error { payload: String::new() }
    );
    assert_eq!(
        RoutedMessage::decode(&Message::disconnect("connection lost")).unwrap(),
        RoutedMessage::Disconnect { cause: "connection lost".into() }
    );
}

#[test]
fn rejects_short_and_unknown_topics() {
    assert!(matches!(
        RoutedMessage::decode(&Message::new("margot/welcome", "")),
        Err(RouteError::BadTopic(_))
    ));
    assert!(matches!(
        RoutedMessage::decode(&Message::new("margot/app^blk^1/mystery/c1", "")),
        Err(RouteError::UnknownKind { .. })
    ));
    assert!(matches!(
        RoutedMessage::decode(&Message::new("margot/appblk/welcome/c1", "")),
        Err(RouteError::BadApplicationId(_))
    ));
}
