// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin launcher: sandboxed execution of the external DoE / model /
//! cluster / prediction programs.
//!
//! Each invocation runs inside a per-application copy of the installed
//! plugin directory, with its inputs and outputs described by a generated
//! `KEY="VALUE"` environment file handed to the entry script as its sole
//! argument.

use agora_core::ApplicationId;
use agora_storage::PluginProperties;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Entry script every plugin directory provides.
pub const PLUGIN_SCRIPT: &str = "generate_model.sh";

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("the plugin path '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the plugin working directory doesn't exist, initialize the launcher first")]
    MissingWorkspace,

    #[error("the plugin script '{0}' cannot be found")]
    MissingScript(PathBuf),

    #[error("no environment configuration was ever launched")]
    MissingConfiguration,

    #[error("unable to spawn the plugin script '{path}': {source}")]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin process terminated with return code {0}")]
    PluginFailed(i32),

    #[error("unable to wait for the plugin process: {0}")]
    WaitFailed(std::io::Error),
}

/// Where plugins are installed and where their sandboxes live.
#[derive(Debug, Clone)]
pub struct LauncherConfiguration {
    pub plugins_root: PathBuf,
    pub workspace_root: PathBuf,
    pub script_file_name: String,
}

impl LauncherConfiguration {
    pub fn new(plugins_root: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            plugins_root: plugins_root.into(),
            workspace_root: workspace_root.into(),
            script_file_name: PLUGIN_SCRIPT.to_string(),
        }
    }
}

/// The named properties one plugin invocation receives.
#[derive(Debug, Clone)]
pub struct PluginConfiguration {
    /// Base name of the generated environment file.
    pub name: String,
    pub properties: PluginProperties,
}

impl PluginConfiguration {
    pub fn new(name: impl Into<String>, properties: PluginProperties) -> Self {
        Self { name: name.into(), properties }
    }
}

/// Executes one plugin inside its sandbox directory.
pub struct Launcher {
    plugin_path: PathBuf,
    workspace_path: PathBuf,
    script_file_name: String,
    plugin_working_dir: Mutex<Option<PathBuf>>,
    last_configuration: Mutex<Option<PluginConfiguration>>,
}

impl Launcher {
    pub fn new(configuration: &LauncherConfiguration, plugin_name: &str) -> Self {
        Self {
            plugin_path: configuration.plugins_root.join(plugin_name),
            workspace_path: configuration.workspace_root.clone(),
            script_file_name: configuration.script_file_name.clone(),
            plugin_working_dir: Mutex::new(None),
            last_configuration: Mutex::new(None),
        }
    }

    /// Copy the installed plugin directory into the per-application sandbox,
    /// updating files already present, and remember it as the working
    /// directory.
    pub fn initialize_workspace(&self, app_id: &ApplicationId) -> Result<(), LauncherError> {
        let destination = self
            .workspace_path
            .join(app_id.path())
            .join(self.plugin_path.file_name().unwrap_or_default());

        if destination.exists() {
            debug!(path = %destination.display(), "plugin working directory already exists");
        }
        copy_plugin_directory(&self.plugin_path, &destination)?;

        *self.plugin_working_dir.lock() = Some(destination);
        Ok(())
    }

    /// Emit the environment file and spawn the entry script with the file
    /// path as its sole argument. The child must be awaited with [`wait`].
    ///
    /// [`wait`]: Launcher::wait
    pub fn launch(&self, configuration: PluginConfiguration) -> Result<Child, LauncherError> {
        let working_dir = self.working_dir()?;
        let script_path = working_dir.join(&self.script_file_name);
        if !script_path.exists() {
            return Err(LauncherError::MissingScript(script_path));
        }

        let config_path = self.config_path(&working_dir, &configuration.name);
        self.write_configuration(&configuration, &working_dir, &config_path)?;
        *self.last_configuration.lock() = Some(configuration);

        self.start_plugin(&script_path, &config_path, &working_dir)
    }

    /// Re-run the plugin with the last environment configuration.
    pub fn relaunch(&self) -> Result<Child, LauncherError> {
        info!("launching using the last configuration set");
        let working_dir = self.working_dir()?;
        let script_path = working_dir.join(&self.script_file_name);

        let name = self
            .last_configuration
            .lock()
            .as_ref()
            .map(|c| c.name.clone())
            .ok_or(LauncherError::MissingConfiguration)?;
        let config_path = self.config_path(&working_dir, &name);
        if !config_path.exists() {
            return Err(LauncherError::MissingConfiguration);
        }

        self.start_plugin(&script_path, &config_path, &working_dir)
    }

    /// Await the plugin process; a non-zero exit status is an error.
    pub async fn wait(mut child: Child) -> Result<(), LauncherError> {
        let status = child.wait().await.map_err(LauncherError::WaitFailed)?;
        if status.success() {
            Ok(())
        } else {
            let code = status.code().unwrap_or(-1);
            warn!("a plugin process terminated with return code {code}");
            Err(LauncherError::PluginFailed(code))
        }
    }

    fn working_dir(&self) -> Result<PathBuf, LauncherError> {
        self.plugin_working_dir
            .lock()
            .clone()
            .filter(|dir| dir.exists())
            .ok_or(LauncherError::MissingWorkspace)
    }

    fn config_path(&self, working_dir: &Path, name: &str) -> PathBuf {
        working_dir.join(format!("{name}.env"))
    }

    fn write_configuration(
        &self,
        configuration: &PluginConfiguration,
        working_dir: &Path,
        config_path: &Path,
    ) -> Result<(), LauncherError> {
        let mut content = String::new();
        for (key, value) in &configuration.properties {
            content.push_str(&format!("{key}=\"{value}\"\n"));
        }
        content.push_str(&format!("WORKING_DIRECTORY=\"{}\"\n", working_dir.display()));
        content.push_str(&format!("CONFIG_FILE_PATH=\"{}\"\n", config_path.display()));

        std::fs::write(config_path, content)
            .map_err(|e| LauncherError::Io { path: config_path.to_path_buf(), source: e })
    }

    fn start_plugin(
        &self,
        script_path: &Path,
        config_path: &Path,
        working_dir: &Path,
    ) -> Result<Child, LauncherError> {
        debug!(script = %script_path.display(), config = %config_path.display(), "starting plugin");
        Command::new(script_path)
            .arg(config_path)
            .current_dir(working_dir)
            .spawn()
            .map_err(|e| LauncherError::SpawnFailed { path: script_path.to_path_buf(), source: e })
    }
}

/// Recursive copy, updating files already present in the destination.
fn copy_plugin_directory(from: &Path, to: &Path) -> Result<(), LauncherError> {
    if !from.is_dir() {
        return Err(LauncherError::NotADirectory(from.to_path_buf()));
    }
    std::fs::create_dir_all(to).map_err(|e| LauncherError::Io { path: to.to_path_buf(), source: e })?;

    for entry in WalkDir::new(from) {
        let entry =
            entry.map_err(|e| LauncherError::Io { path: from.to_path_buf(), source: e.into() })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|_| LauncherError::NotADirectory(entry.path().to_path_buf()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| LauncherError::Io { path: target.clone(), source: e })?;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| LauncherError::Io { path: target.clone(), source: e })?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
