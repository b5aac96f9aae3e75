// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn pop_returns_messages_in_fifo_order() {
    let inbox = Inbox::new();
    inbox.push(Message::new("t/1", "a"));
    inbox.push(Message::new("t/2", "b"));

    assert_eq!(inbox.pop().await.unwrap().payload, "a");
    assert_eq!(inbox.pop().await.unwrap().payload, "b");
}

#[tokio::test]
async fn pop_wakes_up_on_push() {
    let inbox = Arc::new(Inbox::new());
    let consumer = {
        let inbox = Arc::clone(&inbox);
        tokio::spawn(async move { inbox.pop().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    inbox.push(Message::new("t", "late"));

    let message = consumer.await.unwrap().unwrap();
    assert_eq!(message.payload, "late");
}

#[tokio::test]
async fn close_wakes_every_waiter() {
    let inbox = Arc::new(Inbox::new());
    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let inbox = Arc::clone(&inbox);
            tokio::spawn(async move { inbox.pop().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    inbox.close();

    for consumer in consumers {
        assert!(consumer.await.unwrap().is_none());
    }
}

#[tokio::test]
async fn queued_messages_survive_close() {
    let inbox = Inbox::new();
    inbox.push(Message::new("t", "queued"));
    inbox.close();

    assert_eq!(inbox.pop().await.unwrap().payload, "queued");
    assert!(inbox.pop().await.is_none());
}

#[tokio::test]
async fn push_after_close_is_dropped() {
    let inbox = Inbox::new();
    inbox.close();
    inbox.push(Message::new("t", "ghost"));
    assert!(inbox.is_empty());
    assert!(inbox.pop().await.is_none());
}

#[tokio::test]
async fn competing_consumers_each_get_one_message() {
    let inbox = Arc::new(Inbox::new());
    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let inbox = Arc::clone(&inbox);
            tokio::spawn(async move { inbox.pop().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    for i in 0..4 {
        inbox.push(Message::new("t", format!("m{i}")));
    }

    let mut payloads: Vec<String> = Vec::new();
    for consumer in consumers {
        payloads.push(consumer.await.unwrap().unwrap().payload);
    }
    payloads.sort();
    assert_eq!(payloads, ["m0", "m1", "m2", "m3"]);
}
