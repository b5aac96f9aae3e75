// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S1/S2: the full pipeline for a featureless application, including a
//! second client joining mid-exploration.

use super::common::{observation, published_on, wait_until, BROADCAST_TOPIC, WELCOME_TOPIC};
use agora_core::{ApplicationStatus, Message};
use agora_daemon::test_support::{app_id, TestEnv, PLAIN_DESCRIPTION};
use agora_daemon::WorkerPool;

fn full_pipeline_env() -> TestEnv {
    let env = TestEnv::new();
    env.install_default_doe_plugin();
    env.install_default_model_plugin();
    env.install_prediction_plugin(
        "prediction_id,threads,latency_avg,latency_std",
        &["p1,1,10,1", "p2,2,7,1", "p3,4,5,1"],
    );
    env
}

#[tokio::test]
async fn first_client_gets_a_model_after_the_exploration() {
    let env = full_pipeline_env();
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    env.remote.inject(Message::new(WELCOME_TOPIC, PLAIN_DESCRIPTION));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/explore") >= 1).await;

    // six observations cover each configuration twice
    for (i, threads) in ["1", "2", "4", "1", "2", "4"].iter().enumerate() {
        env.remote.inject(observation(i as i64, threads, "5.0"));
    }

    wait_until(|| published_on(&env, BROADCAST_TOPIC) == 1).await;

    let handler = manager.get_handler(&app_id());
    assert!(handler.status().contains(ApplicationStatus::WITH_PREDICTION));
    assert_eq!(handler.remaining_explorations(), 0);

    let sent = env.remote.sent();
    let broadcast = sent.iter().find(|m| m.topic == BROADCAST_TOPIC).unwrap();
    let table: serde_json::Value = serde_json::from_str(&broadcast.payload).unwrap();
    assert_eq!(table.as_object().unwrap().len(), 3);

    env.remote.close();
    pool.wait().await;
}

#[tokio::test]
async fn second_client_joins_mid_exploration_without_a_doe_relaunch() {
    let env = full_pipeline_env();
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    env.remote.inject(Message::new(WELCOME_TOPIC, PLAIN_DESCRIPTION));
    env.remote.inject(observation(1, "1", "5.0"));
    env.remote.inject(observation(2, "2", "4.0"));
    env.remote.inject(Message::new("margot/app^blk^1/welcome/c2", PLAIN_DESCRIPTION));

    wait_until(|| published_on(&env, "margot/app^blk^1/c2/explore") == 1).await;

    assert_eq!(env.doe_runs(&app_id()), 1);
    let handler = manager.get_handler(&app_id());
    assert_eq!(handler.active_clients(), vec!["c1", "c2"]);

    env.remote.close();
    pool.wait().await;
}

#[tokio::test]
async fn shutdown_terminates_the_whole_pool() {
    let env = full_pipeline_env();
    let pool = WorkerPool::start(env.manager(), 3);

    env.remote.inject(Message::new("margot/system/operator", "shutdown"));

    tokio::time::timeout(std::time::Duration::from_secs(10), pool.wait())
        .await
        .expect("the pool should stop after a shutdown command");
}
