// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S4: features enable the clustering plugin; the prediction table pairs
//! every configuration with every centroid.

use super::common::{published_on, wait_until, BROADCAST_TOPIC, WELCOME_TOPIC};
use agora_core::{ApplicationStatus, Message};
use agora_daemon::test_support::{app_id, TestEnv, FEATURED_DESCRIPTION};
use agora_daemon::WorkerPool;

#[tokio::test]
async fn clustering_runs_alongside_the_exploration() {
    let env = TestEnv::new();
    env.install_default_doe_plugin();
    env.install_default_model_plugin();
    env.install_default_cluster_plugin();
    env.install_prediction_plugin(
        "prediction_id,threads,size,latency_avg,latency_std",
        &[
            "p1,1,10,10,1",
            "p2,2,10,7,1",
            "p3,4,10,5,1",
            "p4,1,1000,20,2",
            "p5,2,1000,14,2",
            "p6,4,1000,9,2",
        ],
    );
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    env.remote.inject(Message::new(WELCOME_TOPIC, FEATURED_DESCRIPTION));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/explore") >= 1).await;

    // the centroids were computed while the exploration was still running
    let handler = manager.get_handler(&app_id());
    assert!(handler
        .status()
        .contains(ApplicationStatus::WITH_CLUSTER | ApplicationStatus::EXPLORING));

    for (i, threads) in ["1", "2", "4", "1", "2", "4"].iter().enumerate() {
        env.remote.inject(Message::new(
            "margot/app^blk^1/observation/c1",
            format!("{i}@0@size=10@threads={threads}@latency=5.0"),
        ));
    }

    wait_until(|| published_on(&env, BROADCAST_TOPIC) == 1).await;

    let sent = env.remote.sent();
    let broadcast = sent.iter().find(|m| m.topic == BROADCAST_TOPIC).unwrap();
    let table: serde_json::Value = serde_json::from_str(&broadcast.payload).unwrap();
    // 3 configurations x 2 centroids
    assert_eq!(table.as_object().unwrap().len(), 6);
    assert_eq!(table["p6"]["features"]["size"], "1000");
    assert_eq!(table["p6"]["configuration"]["threads"], "4");

    env.remote.close();
    pool.wait().await;
}
