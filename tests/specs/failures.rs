// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5/S6: sanitizer violations are dropped, plugin failures abort the
//! triggering client and regress the handler.

use super::common::{observation, published_on, wait_until, WELCOME_TOPIC};
use agora_core::{ApplicationStatus, Message};
use agora_daemon::test_support::{app_id, TestEnv, PLAIN_DESCRIPTION};
use agora_daemon::WorkerPool;

#[tokio::test]
async fn a_payload_outside_the_whitelist_changes_nothing() {
    let env = TestEnv::new();
    env.install_default_doe_plugin();
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    env.remote.inject(Message::new(WELCOME_TOPIC, PLAIN_DESCRIPTION));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/explore") >= 1).await;
    let handler = manager.get_handler(&app_id());
    let before = handler.remaining_explorations();

    // '|' is not whitelisted: the message collapses to the error sentinel
    env.remote
        .inject(Message::new("margot/app^blk^1/observation/c1", "1@0@@threads=1|boom@latency=1"));
    // a follow-up valid observation proves the bad one was dropped first
    env.remote.inject(observation(2, "1", "5.0"));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/explore") >= 2).await;

    assert_eq!(handler.remaining_explorations(), before - 1);

    env.remote.close();
    pool.wait().await;
}

#[tokio::test]
async fn a_failing_doe_plugin_aborts_the_client_and_regresses() {
    let env = TestEnv::new();
    env.install_plugin("doe", "exit 2");
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    env.remote.inject(Message::new(WELCOME_TOPIC, PLAIN_DESCRIPTION));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/abort") == 1).await;

    let handler = manager.get_handler(&app_id());
    assert_eq!(handler.status(), ApplicationStatus::WITH_INFORMATION);

    env.remote.close();
    pool.wait().await;
}

#[tokio::test]
async fn the_next_welcome_relaunches_a_failed_doe() {
    let env = TestEnv::new();
    // fail once, then produce a plan
    env.install_plugin(
        "doe",
        r#"if [ ! -f "$WORKING_DIRECTORY/armed" ]; then
  touch "$WORKING_DIRECTORY/armed"
  exit 2
fi
cat > "$DOE_CONTAINER_NAME" <<TABLE
config_id,threads,counter
cfg1,1,2
TABLE
cat > "$TOTAL_CONFIGURATIONS_CONTAINER_NAME" <<TABLE
total_configurations
1
TABLE"#,
    );
    let manager = env.manager();
    let pool = WorkerPool::start(manager.clone(), 1);

    env.remote.inject(Message::new(WELCOME_TOPIC, PLAIN_DESCRIPTION));
    wait_until(|| published_on(&env, "margot/app^blk^1/c1/abort") == 1).await;

    env.remote.inject(Message::new("margot/app^blk^1/welcome/c2", ""));
    wait_until(|| published_on(&env, "margot/app^blk^1/c2/explore") == 1).await;

    let handler = manager.get_handler(&app_id());
    assert!(handler.status().contains(ApplicationStatus::EXPLORING));

    env.remote.close();
    pool.wait().await;
}
