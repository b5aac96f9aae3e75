// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{app_id, TestEnv, FEATURED_DESCRIPTION, PLAIN_DESCRIPTION};
use agora_core::Message;

fn handler(env: &TestEnv) -> ApplicationHandler {
    ApplicationHandler::new(
        app_id(),
        env.remote.clone(),
        &env.fs_configuration,
        env.launcher_configuration.clone(),
    )
}

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

fn sent_on<'a>(messages: &'a [Message], topic: &str) -> Vec<&'a Message> {
    messages.iter().filter(|m| m.topic == topic).collect()
}

#[tokio::test]
async fn first_client_runs_the_full_pipeline() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;

    assert!(handler
        .status()
        .contains(ApplicationStatus::WITH_INFORMATION | ApplicationStatus::WITH_DOE));
    assert!(handler.status().contains(ApplicationStatus::EXPLORING));
    assert_eq!(handler.remaining_explorations(), 6);

    // the new client received its first configuration
    let sent = env.remote.sent();
    let explores = sent_on(&sent, "margot/app^blk^1/c1/explore");
    assert_eq!(explores.len(), 1);
    let configuration: serde_json::Value =
        serde_json::from_str(&explores[0].payload).unwrap();
    assert_eq!(configuration["threads"], "1");

    // six observations cover each configuration twice
    for threads in ["1", "2", "4", "1", "2", "4"] {
        handler
            .process_observation("c1", 10, 0, &format!("@threads={threads}@latency=5.0"))
            .await;
    }

    let status = handler.status();
    assert!(!status.contains(ApplicationStatus::EXPLORING));
    assert!(status.contains(ApplicationStatus::WITH_MODEL));
    assert!(status.contains(ApplicationStatus::WITH_PREDICTION));
    assert!(status.is_consistent());

    // the prediction table was broadcast with three rows
    let sent = env.remote.sent();
    let broadcasts = sent_on(&sent, "margot/app^blk^1/prediction");
    assert_eq!(broadcasts.len(), 1);
    let table: serde_json::Value = serde_json::from_str(&broadcasts[0].payload).unwrap();
    assert_eq!(table.as_object().unwrap().len(), 3);
    assert_eq!(table["p2"]["predicted"]["latency"]["avg"], "7");

    // every observation landed in the trace
    assert_eq!(env.fs().observation.count(&app_id()).unwrap(), 6);
}

#[tokio::test]
async fn second_client_joins_mid_exploration() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    handler.process_observation("c1", 10, 0, "@threads=1@latency=5.0").await;
    handler.process_observation("c1", 11, 0, "@threads=2@latency=4.0").await;

    handler.welcome_client("c2", PLAIN_DESCRIPTION).await;

    // no doe relaunch, c2 is served the next row right away
    assert_eq!(env.doe_runs(&app_id()), 1);
    assert_eq!(handler.active_clients(), vec!["c1", "c2"]);
    let sent = env.remote.sent();
    assert_eq!(sent_on(&sent, "margot/app^blk^1/c2/explore").len(), 1);
}

#[tokio::test]
async fn welcome_is_idempotent() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;

    assert_eq!(handler.active_clients(), vec!["c1"]);
    assert_eq!(env.doe_runs(&app_id()), 1);
}

#[tokio::test]
async fn welcome_after_prediction_sends_the_table_to_the_new_client() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    for threads in ["1", "2", "4", "1", "2", "4"] {
        handler
            .process_observation("c1", 10, 0, &format!("@threads={threads}@latency=5.0"))
            .await;
    }

    handler.welcome_client("c2", "").await;

    let sent = env.remote.sent();
    let tables = sent_on(&sent, "margot/app^blk^1/c2/prediction");
    assert_eq!(tables.len(), 1);
    let table: serde_json::Value = serde_json::from_str(&tables[0].payload).unwrap();
    assert_eq!(table.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn unusable_description_aborts_the_client() {
    let env = TestEnv::new();
    let handler = handler(&env);

    handler.welcome_client("c1", "knob threads").await;

    assert_eq!(handler.status(), ApplicationStatus::CLUELESS);
    let sent = env.remote.sent();
    assert_eq!(sent_on(&sent, "margot/app^blk^1/c1/abort").len(), 1);
}

#[tokio::test]
async fn mismatching_redeclaration_is_ignored() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    handler
        .welcome_client("c2", "knob threads int32 1 2 4 8@metric latency float model")
        .await;

    assert_eq!(handler.active_clients(), vec!["c1", "c2"]);
    // the authoritative description still has three admissible values
    let stored = env.fs().description.load(&app_id()).unwrap();
    assert_eq!(stored.knobs[0].values.len(), 3);
}

#[tokio::test]
async fn malformed_observation_changes_nothing() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    let before = handler.remaining_explorations();

    handler.process_observation("c1", 10, 0, "threads=1@latency").await;
    handler.process_observation("c1", 10, 0, "not even close").await;

    assert_eq!(handler.remaining_explorations(), before);
    assert!(handler.status().contains(ApplicationStatus::EXPLORING));
}

#[tokio::test]
async fn observation_for_an_unknown_configuration_is_traced_but_not_consumed() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    handler.process_observation("c1", 10, 0, "@threads=16@latency=5.0").await;

    assert_eq!(handler.remaining_explorations(), 6);
    assert_eq!(env.fs().observation.count(&app_id()).unwrap(), 1);
}

#[tokio::test]
async fn observation_before_any_description_is_dropped() {
    let env = TestEnv::new();
    let handler = handler(&env);

    handler.process_observation("c1", 10, 0, "@threads=1@latency=5.0").await;

    assert_eq!(handler.status(), ApplicationStatus::CLUELESS);
    assert_eq!(env.fs().observation.count(&app_id()).unwrap(), 0);
}

#[tokio::test]
async fn features_run_the_clustering_plugin_alongside_exploration() {
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
    let handler = handler(&env);

    handler.welcome_client("c1", FEATURED_DESCRIPTION).await;
    assert!(handler
        .status()
        .contains(ApplicationStatus::WITH_CLUSTER | ApplicationStatus::EXPLORING));

    for threads in ["1", "2", "4", "1", "2", "4"] {
        handler
            .process_observation(
                "c1",
                10,
                0,
                &format!("size=10@threads={threads}@latency=5.0"),
            )
            .await;
    }

    assert!(handler.status().contains(ApplicationStatus::WITH_PREDICTION));
    let sent = env.remote.sent();
    let broadcasts = sent_on(&sent, "margot/app^blk^1/prediction");
    assert_eq!(broadcasts.len(), 1);
    let table: serde_json::Value = serde_json::from_str(&broadcasts[0].payload).unwrap();
    // 3 configurations x 2 centroids
    assert_eq!(table.as_object().unwrap().len(), 6);
    assert_eq!(table["p4"]["features"]["size"], "1000");
}

#[tokio::test]
async fn doe_plugin_failure_aborts_and_regresses() {
    let env = TestEnv::new();
    // fail the first run, succeed afterwards
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
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;

    assert_eq!(handler.status(), ApplicationStatus::WITH_INFORMATION);
    let sent = env.remote.sent();
    assert_eq!(sent_on(&sent, "margot/app^blk^1/c1/abort").len(), 1);

    // the next welcome relaunches the doe
    handler.welcome_client("c2", "").await;
    assert!(handler.status().contains(ApplicationStatus::WITH_DOE));
    assert!(handler.status().contains(ApplicationStatus::EXPLORING));
}

#[tokio::test]
async fn recovery_resumes_a_half_explored_doe() {
    let env = full_pipeline_env();

    // a previous run left description + a partially consumed doe behind
    {
        let fs = env.fs();
        let description = BlockDescription::parse(PLAIN_DESCRIPTION).unwrap();
        fs.description.store(&app_id(), &description).unwrap();
        fs.observation.create_table(&app_id(), &description).unwrap();

        let mut doe = DoeModel::new();
        let mut cfg1 = agora_core::Configuration::new();
        cfg1.insert("threads".into(), "1".into());
        let mut cfg3 = agora_core::Configuration::new();
        cfg3.insert("threads".into(), "4".into());
        doe.add_config("cfg1", cfg1, 1);
        doe.add_config("cfg3", cfg3, 2);
        doe.set_total_configurations(3);
        fs.doe.store(&app_id(), &description, &doe).unwrap();
    }

    let handler = handler(&env);
    handler.welcome_client("c1", "").await;

    let status = handler.status();
    assert!(status.contains(ApplicationStatus::WITH_INFORMATION));
    assert!(status.contains(ApplicationStatus::WITH_DOE | ApplicationStatus::EXPLORING));
    assert_eq!(handler.remaining_explorations(), 3);
    assert_eq!(env.doe_runs(&app_id()), 0);

    // round-robin resumes on the next observation
    handler.process_observation("c1", 10, 0, "@threads=1@latency=5.0").await;
    assert_eq!(handler.remaining_explorations(), 2);
    let stored = env.fs().doe.load(&app_id(), &BlockDescription::parse(PLAIN_DESCRIPTION).unwrap());
    assert!(stored.unwrap().get("cfg1").is_none());
}

#[tokio::test]
async fn recovery_with_a_finished_exploration_builds_the_models() {
    let env = full_pipeline_env();

    {
        let fs = env.fs();
        let description = BlockDescription::parse(PLAIN_DESCRIPTION).unwrap();
        fs.description.store(&app_id(), &description).unwrap();
        fs.observation.create_table(&app_id(), &description).unwrap();
        // empty doe with a non-zero total: exploration completed
        let mut doe = DoeModel::new();
        doe.set_total_configurations(3);
        fs.doe.store(&app_id(), &description, &doe).unwrap();
    }

    let handler = handler(&env);
    handler.welcome_client("c1", "").await;

    let status = handler.status();
    assert!(status.contains(ApplicationStatus::WITH_MODEL));
    assert!(status.contains(ApplicationStatus::WITH_PREDICTION));
    let sent = env.remote.sent();
    assert_eq!(sent_on(&sent, "margot/app^blk^1/prediction").len(), 1);
}

#[tokio::test]
async fn inconsistent_storage_is_dropped_on_recovery() {
    let env = full_pipeline_env();

    // a cluster without any description is a half-written previous run
    {
        let fs = env.fs();
        let description = BlockDescription::parse(FEATURED_DESCRIPTION).unwrap();
        let mut cluster = ClusterModel::new();
        cluster.add_centroid("cen1", vec!["10".into()]);
        fs.cluster.store(&app_id(), &description, &cluster).unwrap();
    }

    let handler = handler(&env);
    handler.welcome_client("c1", "").await;

    assert_eq!(handler.status(), ApplicationStatus::CLUELESS);
    assert!(env.fs().cluster.load(&app_id()).unwrap().is_empty());
}

#[tokio::test]
async fn bye_client_shrinks_the_active_set_only() {
    let env = full_pipeline_env();
    let handler = handler(&env);

    handler.welcome_client("c1", PLAIN_DESCRIPTION).await;
    handler.welcome_client("c2", "").await;
    handler.bye_client("c1");

    assert_eq!(handler.active_clients(), vec!["c2"]);
    assert!(handler.status().contains(ApplicationStatus::EXPLORING));

    handler.bye_client("c2");
    assert!(handler.active_clients().is_empty());
    // the handler keeps its knowledge
    assert!(handler.status().contains(ApplicationStatus::WITH_DOE));
}
