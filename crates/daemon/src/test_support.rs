// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures: a temp-dir server environment with a fake transport and
//! stub plugins. Used by this crate's unit tests and by the workspace spec
//! tests (behind the `test-support` feature).

use crate::launcher::{LauncherConfiguration, PLUGIN_SCRIPT};
use crate::manager::ApplicationManager;
use crate::remote::fake::FakeRemote;
use agora_core::ApplicationId;
use agora_storage::{FsConfiguration, FsHandler};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A self-contained server environment rooted in a temp directory.
pub struct TestEnv {
    pub root: TempDir,
    pub remote: Arc<FakeRemote>,
    pub fs_configuration: FsConfiguration,
    pub launcher_configuration: LauncherConfiguration,
}

impl TestEnv {
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        for dir in ["store", "models", "plugins", "workspace"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }

        let fs_configuration =
            FsConfiguration::new(root.path().join("store"), root.path().join("models"));
        let launcher_configuration =
            LauncherConfiguration::new(root.path().join("plugins"), root.path().join("workspace"));

        Self { root, remote: FakeRemote::new(), fs_configuration, launcher_configuration }
    }

    pub fn manager(&self) -> Arc<ApplicationManager> {
        ApplicationManager::new(
            self.remote.clone(),
            self.fs_configuration.clone(),
            self.launcher_configuration.clone(),
        )
    }

    pub fn fs(&self) -> FsHandler {
        FsHandler::new(&self.fs_configuration)
    }

    /// Install a stub plugin whose entry script sources the env file and
    /// then runs `body`.
    #[allow(clippy::unwrap_used)]
    pub fn install_plugin(&self, name: &str, body: &str) {
        let dir = self.root.path().join("plugins").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join(PLUGIN_SCRIPT);
        std::fs::write(&script, format!("#!/bin/sh\n. \"$1\"\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// A DoE plugin emitting three `threads` configurations, two
    /// explorations each, and counting its runs in `doe_runs.txt`.
    pub fn install_default_doe_plugin(&self) {
        self.install_plugin(
            "doe",
            r#"echo run >> "$WORKING_DIRECTORY/doe_runs.txt"
cat > "$DOE_CONTAINER_NAME" <<TABLE
config_id,threads,counter
cfg1,1,2
cfg2,2,2
cfg3,4,2
TABLE
cat > "$TOTAL_CONFIGURATIONS_CONTAINER_NAME" <<TABLE
total_configurations
3
TABLE"#,
        );
    }

    /// A model plugin leaving a non-empty artifact behind.
    pub fn install_default_model_plugin(&self) {
        self.install_plugin("model", r#"printf 'fitted' > "$MODEL_CONTAINER_NAME""#);
    }

    /// A clustering plugin emitting two `size` centroids.
    pub fn install_default_cluster_plugin(&self) {
        self.install_plugin(
            "cluster",
            r#"cat > "$CLUSTER_CONTAINER_NAME" <<TABLE
centroid_id,size
cen1,10
cen2,1000
TABLE"#,
        );
    }

    /// A prediction plugin writing `rows` verbatim under `header`.
    pub fn install_prediction_plugin(&self, header: &str, rows: &[&str]) {
        let table = format!("{header}\n{}", rows.join("\n"));
        self.install_plugin(
            "prediction",
            &format!("cat > \"$PREDICTIONS_CONTAINER_NAME\" <<TABLE\n{table}\nTABLE"),
        );
    }

    /// How many times the DoE stub ran for an application.
    pub fn doe_runs(&self, app_id: &ApplicationId) -> usize {
        let path = self.sandbox_path(app_id, "doe").join("doe_runs.txt");
        std::fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
    }

    pub fn sandbox_path(&self, app_id: &ApplicationId, plugin: &str) -> PathBuf {
        self.root.path().join("workspace").join(app_id.path()).join(plugin)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// The application identity used throughout the tests.
pub fn app_id() -> ApplicationId {
    ApplicationId::new("app", "blk", "1")
}

/// Description wire payloads used throughout the tests.
pub const PLAIN_DESCRIPTION: &str = "knob threads int32 1 2 4@metric latency float model";
pub const FEATURED_DESCRIPTION: &str =
    "knob threads int32 1 2 4@feature size int32 le@metric latency float model";
