// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide registry of application handlers.

use crate::handler::ApplicationHandler;
use crate::launcher::LauncherConfiguration;
use crate::remote::RemoteHandler;
use agora_core::ApplicationId;
use agora_storage::FsConfiguration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps an application identity to its handler, creating handlers lazily on
/// first reference. One instance per process, configured at startup and
/// shared by handle.
///
/// The map lock is held only for lookup/insert/erase; handlers are shared
/// via `Arc`, so removing one never invalidates an in-flight dispatch.
pub struct ApplicationManager {
    remote: Arc<dyn RemoteHandler>,
    fs_configuration: FsConfiguration,
    launcher_configuration: LauncherConfiguration,
    apps: Mutex<HashMap<String, Arc<ApplicationHandler>>>,
}

impl ApplicationManager {
    pub fn new(
        remote: Arc<dyn RemoteHandler>,
        fs_configuration: FsConfiguration,
        launcher_configuration: LauncherConfiguration,
    ) -> Arc<Self> {
        Arc::new(Self {
            remote,
            fs_configuration,
            launcher_configuration,
            apps: Mutex::new(HashMap::new()),
        })
    }

    pub fn remote(&self) -> Arc<dyn RemoteHandler> {
        Arc::clone(&self.remote)
    }

    /// Look up the handler for an application, creating it on first
    /// reference.
    pub fn get_handler(&self, app_id: &ApplicationId) -> Arc<ApplicationHandler> {
        let mut apps = self.apps.lock();
        if let Some(handler) = apps.get(&app_id.to_string()) {
            return Arc::clone(handler);
        }

        debug!(app = %app_id, "creating a new application handler");
        let handler = Arc::new(ApplicationHandler::new(
            app_id.clone(),
            Arc::clone(&self.remote),
            &self.fs_configuration,
            self.launcher_configuration.clone(),
        ));
        apps.insert(app_id.to_string(), Arc::clone(&handler));
        handler
    }

    /// Drop a handler from the registry. In-flight dispatches keep their
    /// `Arc` and finish undisturbed.
    pub fn remove_handler(&self, app_id: &ApplicationId) {
        if self.apps.lock().remove(&app_id.to_string()).is_none() {
            warn!(app = %app_id, "couldn't remove application handler: unknown id");
        }
    }

    /// Handlers currently registered, for status inspection.
    pub fn handlers(&self) -> Vec<Arc<ApplicationHandler>> {
        self.apps.lock().values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
