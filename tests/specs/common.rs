// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the integration scenarios.

use agora_core::Message;
use agora_daemon::test_support::TestEnv;
use std::time::Duration;

pub const WELCOME_TOPIC: &str = "margot/app^blk^1/welcome/c1";
pub const OBSERVATION_TOPIC: &str = "margot/app^blk^1/observation/c1";
pub const BROADCAST_TOPIC: &str = "margot/app^blk^1/prediction";

/// Poll until the condition holds or the deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within the deadline"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Number of messages published on a topic so far.
pub fn published_on(env: &TestEnv, topic: &str) -> usize {
    env.remote.sent().iter().filter(|m| m.topic == topic).count()
}

pub fn observation(seconds: i64, threads: &str, latency: &str) -> Message {
    Message::new(OBSERVATION_TOPIC, format!("{seconds}@0@@threads={threads}@latency={latency}"))
}
