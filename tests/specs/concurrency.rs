// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invariants 1 and 7: with several workers and interleaved traffic for
//! several applications, every handler ends on a valid state-machine path
//! and its bitmask stays well formed.

use super::common::wait_until;
use agora_core::{ApplicationId, ApplicationStatus, Message};
use agora_daemon::test_support::{TestEnv, PLAIN_DESCRIPTION};
use agora_daemon::WorkerPool;

fn welcome(app: &str, client: &str) -> Message {
    Message::new(format!("margot/{app}^blk^1/welcome/{client}"), PLAIN_DESCRIPTION)
}

fn observation(app: &str, client: &str, seconds: i64, threads: &str) -> Message {
    Message::new(
        format!("margot/{app}^blk^1/observation/{client}"),
        format!("{seconds}@0@@threads={threads}@latency=5.0"),
    )
}

#[tokio::test]
async fn interleaved_applications_keep_consistent_states() {
    let env = TestEnv::new();
    env.install_default_doe_plugin();
    env.install_default_model_plugin();
    env.install_prediction_plugin(
        "prediction_id,threads,latency_avg,latency_std",
        &["p1,1,10,1", "p2,2,7,1", "p3,4,5,1"],
    );
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 4);

    env.remote.inject(welcome("alpha", "c1"));
    env.remote.inject(welcome("beta", "c1"));
    env.remote.inject(welcome("beta", "c2"));

    // both applications finished their doe before observations arrive
    wait_until(|| {
        let sent = env.remote.sent();
        sent.iter().any(|m| m.topic == "margot/alpha^blk^1/c1/explore")
            && sent.iter().any(|m| m.topic.starts_with("margot/beta^blk^1/c"))
    })
    .await;

    // alpha completes its exploration, beta only half of it
    for (i, threads) in ["1", "2", "4", "1", "2", "4"].iter().enumerate() {
        env.remote.inject(observation("alpha", "c1", i as i64, threads));
    }
    for (i, threads) in ["1", "2", "4"].iter().enumerate() {
        let client = if i % 2 == 0 { "c1" } else { "c2" };
        env.remote.inject(observation("beta", client, i as i64, threads));
    }

    wait_until(|| {
        env.remote.sent().iter().any(|m| m.topic == "margot/alpha^blk^1/prediction")
    })
    .await;

    let alpha = manager.get_handler(&ApplicationId::new("alpha", "blk", "1"));
    let beta = manager.get_handler(&ApplicationId::new("beta", "blk", "1"));

    assert!(alpha.status().contains(ApplicationStatus::WITH_PREDICTION));
    assert_eq!(alpha.remaining_explorations(), 0);

    assert!(beta.status().contains(ApplicationStatus::EXPLORING));
    assert_eq!(beta.remaining_explorations(), 3);

    // invariant: every registered handler carries a well-formed bitmask
    for handler in manager.handlers() {
        assert!(handler.status().is_consistent(), "bad status: {}", handler.status());
    }

    env.remote.close();
    pool.wait().await;
}
