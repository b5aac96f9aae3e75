// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3: a restarted server resumes a half-explored doe from storage.

use super::common::{observation, published_on, wait_until};
use agora_core::{ApplicationStatus, BlockDescription, Configuration, DoeModel, Message};
use agora_daemon::test_support::{app_id, TestEnv, PLAIN_DESCRIPTION};
use agora_daemon::WorkerPool;

fn seed_half_explored_storage(env: &TestEnv) {
    let fs = env.fs();
    let description = BlockDescription::parse(PLAIN_DESCRIPTION).unwrap();
    fs.description.store(&app_id(), &description).unwrap();
    fs.observation.create_table(&app_id(), &description).unwrap();

    let mut cfg1 = Configuration::new();
    cfg1.insert("threads".into(), "1".into());
    let mut cfg3 = Configuration::new();
    cfg3.insert("threads".into(), "4".into());

    let mut doe = DoeModel::new();
    doe.add_config("cfg1", cfg1, 1);
    doe.add_config("cfg3", cfg3, 2);
    doe.set_total_configurations(3);
    fs.doe.store(&app_id(), &description, &doe).unwrap();
}

#[tokio::test]
async fn a_restarted_server_resumes_the_exploration() {
    let env = TestEnv::new();
    env.install_default_doe_plugin();
    seed_half_explored_storage(&env);

    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    // the first referencing message triggers the recovery
    env.remote.inject(observation(100, "1", "6.0"));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/explore") >= 1).await;

    let handler = manager.get_handler(&app_id());
    assert!(handler
        .status()
        .contains(ApplicationStatus::WITH_DOE | ApplicationStatus::EXPLORING));
    // cfg1 had a single exploration left and is now gone
    assert_eq!(handler.remaining_explorations(), 2);
    assert_eq!(env.doe_runs(&app_id()), 0);

    env.remote.close();
    pool.wait().await;
}

#[tokio::test]
async fn leftovers_without_a_description_restart_from_scratch() {
    let env = TestEnv::new();
    env.install_default_doe_plugin();

    // a half-written previous run: doe counters but no description
    {
        let fs = env.fs();
        let description = BlockDescription::parse(PLAIN_DESCRIPTION).unwrap();
        let mut doe = DoeModel::new();
        let mut cfg = Configuration::new();
        cfg.insert("threads".into(), "1".into());
        doe.add_config("cfg1", cfg, 1);
        doe.set_total_configurations(1);
        fs.doe.store(&app_id(), &description, &doe).unwrap();
        fs.description.erase(&app_id()).unwrap();
    }

    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    // recovery drops the leftovers, then the welcome starts from clueless
    env.remote.inject(Message::new(super::common::WELCOME_TOPIC, PLAIN_DESCRIPTION));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/explore") >= 1).await;

    let handler = manager.get_handler(&app_id());
    // the doe was rebuilt by the plugin, not resumed from the leftovers
    assert_eq!(env.doe_runs(&app_id()), 1);
    assert_eq!(handler.remaining_explorations(), 6);

    env.remote.close();
    pool.wait().await;
}
