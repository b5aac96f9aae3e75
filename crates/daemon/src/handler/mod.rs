// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-application state machine.
//!
//! Carries one application from clueless to serving predictions: ingests the
//! block description, orchestrates the DoE / cluster / model / prediction
//! plugins, dispatches configurations round-robin to exploring clients, and
//! recovers its position from storage after a restart.
//!
//! Locking discipline: `state` is only ever held across in-memory mutation.
//! Storage I/O and plugin execution happen with the lock released; the
//! resulting transition is committed by reacquiring it.

mod messages;
mod pipeline;

use crate::launcher::{Launcher, LauncherConfiguration, LauncherError};
use crate::remote::RemoteHandler;
use agora_core::{
    ApplicationId, ApplicationStatus, BlockDescription, ClusterModel, DoeModel, Message,
    Observation, PredictionModel,
};
use agora_storage::{FsConfiguration, FsHandler, StorageError};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub(crate) enum HandlerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Launcher(#[from] LauncherError),

    #[error("the doe plugin produced no configurations to explore")]
    EmptyDoe,

    #[error("the cluster plugin produced no centroids")]
    EmptyCluster,

    #[error("the prediction plugin produced no rows")]
    EmptyPrediction,

    #[error("the model plugin left no artifact for metric '{0}'")]
    InvalidModel(String),
}

/// Everything guarded by the per-handler lock.
pub(crate) struct HandlerState {
    pub status: ApplicationStatus,
    pub description: BlockDescription,
    pub doe: DoeModel,
    pub cluster: ClusterModel,
    pub prediction: PredictionModel,
    pub active_clients: BTreeSet<String>,
    pub iteration_number: u32,
    pub num_configurations_per_iteration: u32,
    pub num_configurations_sent_per_iteration: u32,
    /// Set once the first referencing message has replayed storage.
    pub recovered: bool,
}

impl HandlerState {
    fn new() -> Self {
        Self {
            status: ApplicationStatus::CLUELESS,
            description: BlockDescription::default(),
            doe: DoeModel::new(),
            cluster: ClusterModel::new(),
            prediction: PredictionModel::new(),
            active_clients: BTreeSet::new(),
            iteration_number: 1,
            num_configurations_per_iteration: 0,
            num_configurations_sent_per_iteration: 0,
            recovered: false,
        }
    }
}

pub struct ApplicationHandler {
    app_id: ApplicationId,
    remote: Arc<dyn RemoteHandler>,
    fs: FsHandler,
    launcher_configuration: LauncherConfiguration,
    launchers: Mutex<HashMap<String, Arc<Launcher>>>,
    state: Mutex<HandlerState>,
}

impl ApplicationHandler {
    pub fn new(
        app_id: ApplicationId,
        remote: Arc<dyn RemoteHandler>,
        fs_configuration: &FsConfiguration,
        launcher_configuration: LauncherConfiguration,
    ) -> Self {
        Self {
            app_id,
            remote,
            fs: FsHandler::new(fs_configuration),
            launcher_configuration,
            launchers: Mutex::new(HashMap::new()),
            state: Mutex::new(HandlerState::new()),
        }
    }

    pub fn app_id(&self) -> &ApplicationId {
        &self.app_id
    }

    /// Register a client and move the machine along: ingest the description
    /// when this is the first client, hand out the current knowledge
    /// (prediction table or a doe row) otherwise, then run whatever pipeline
    /// stage became due.
    pub async fn welcome_client(&self, client_id: &str, payload: &str) {
        self.ensure_recovered().await;

        let entry_status = {
            let mut st = self.state.lock();
            if st.active_clients.insert(client_id.to_string()) {
                info!(app = %self.app_id, client = client_id, "welcoming a new client");
            }
            st.status
        };

        if entry_status.contains(ApplicationStatus::CLUELESS) {
            if !self.install_description(client_id, payload).await {
                return;
            }
        } else if entry_status.contains(ApplicationStatus::WITH_INFORMATION) && !payload.is_empty()
        {
            self.check_redeclaration(payload);
        }

        if entry_status.contains(ApplicationStatus::WITH_PREDICTION) {
            let payload = self.state.lock().prediction.to_json();
            self.send(Message::new(messages::prediction_topic(&self.app_id, client_id), payload))
                .await;
        } else if entry_status.contains(ApplicationStatus::EXPLORING) {
            let message = {
                let mut st = self.state.lock();
                messages::next_configuration(&mut st, &self.app_id, client_id)
            };
            if let Some(message) = message {
                self.send(message).await;
            }
        }

        self.drive_pipeline(client_id).await;
    }

    /// Drop a client from the active set. The handler stays in memory even
    /// when the set becomes empty.
    pub fn bye_client(&self, client_id: &str) {
        info!(app = %self.app_id, client = client_id, "goodbye client");
        self.state.lock().active_clients.remove(client_id);
    }

    /// Ingest one runtime observation: persist it to the trace, consume the
    /// matching doe row while exploring, hand the client its next
    /// configuration, and run the pipeline stage that may have become due.
    pub async fn process_observation(
        &self,
        client_id: &str,
        seconds: i64,
        nanoseconds: i64,
        body: &str,
    ) {
        self.ensure_recovered().await;

        let description = {
            let st = self.state.lock();
            if !st.status.contains(ApplicationStatus::WITH_INFORMATION) {
                trace!(app = %self.app_id, "observation for an application without description, dropped");
                return;
            }
            st.description.clone()
        };

        let observation = match Observation::parse(body, &description) {
            Ok(observation) => observation,
            Err(e) => {
                warn!(app = %self.app_id, client = client_id, "malformed observation dropped: {e}");
                return;
            }
        };

        // the trace keeps every observation, exploring or not
        if let Err(e) = self.fs.observation.insert(
            &self.app_id,
            &description,
            client_id,
            seconds,
            nanoseconds,
            &observation,
        ) {
            warn!(app = %self.app_id, "unable to persist an observation: {e}");
            self.abort_client(client_id).await;
            self.reset_for_recovery();
            return;
        }

        let (doe_snapshot, next_message) = {
            let mut st = self.state.lock();
            let mut snapshot = None;
            let mut next = None;

            if st.status.contains(ApplicationStatus::EXPLORING) {
                let matched = st
                    .doe
                    .find_configuration(&observation.configuration)
                    .map(str::to_string);
                if let Some(configuration_id) = matched {
                    st.doe.update_config(&configuration_id);
                    snapshot = Some(st.doe.clone());

                    if st.doe.is_empty() {
                        info!(app = %self.app_id, "every configuration explored, leaving the exploration phase");
                        st.status.remove(ApplicationStatus::EXPLORING);
                    } else {
                        next = messages::next_configuration(&mut st, &self.app_id, client_id);
                    }
                }
            }
            (snapshot, next)
        };

        if let Some(doe) = doe_snapshot {
            if let Err(e) = self.fs.doe.store(&self.app_id, &description, &doe) {
                warn!(app = %self.app_id, "unable to persist the doe update: {e}");
                self.abort_client(client_id).await;
                self.reset_for_recovery();
                return;
            }
        }
        if let Some(message) = next_message {
            self.send(message).await;
        }

        self.drive_pipeline(client_id).await;
    }

    // -- accessors used by the router and the tests --

    pub fn status(&self) -> ApplicationStatus {
        self.state.lock().status
    }

    pub fn active_clients(&self) -> Vec<String> {
        self.state.lock().active_clients.iter().cloned().collect()
    }

    pub fn remaining_explorations(&self) -> u32 {
        self.state.lock().doe.remaining_total()
    }

    pub fn prediction_rows(&self) -> usize {
        self.state.lock().prediction.len()
    }

    // -- recovery --

    /// Replay storage on the first referencing message: whatever loads sets
    /// the matching WITH_* bit, and the handler resumes at the first idle
    /// state consistent with the artifacts.
    async fn ensure_recovered(&self) {
        {
            let mut st = self.state.lock();
            if st.recovered {
                return;
            }
            st.recovered = true;
            st.status = ApplicationStatus::RECOVERING;
        }
        info!(app = %self.app_id, "the recovery process is started");

        let description = self.fs.description.load(&self.app_id).unwrap_or_else(|e| {
            warn!(app = %self.app_id, "unable to load the description: {e}");
            BlockDescription::default()
        });
        let description_ok = !description.knobs.is_empty() && !description.metrics.is_empty();

        if !description_ok {
            if self.storage_has_leftovers() {
                warn!(app = %self.app_id, "inconsistent storage information, dropping existing data");
                if let Err(e) = self.fs.erase_application(&self.app_id) {
                    warn!(app = %self.app_id, "unable to drop the stored containers: {e}");
                }
            }
            self.state.lock().status = ApplicationStatus::CLUELESS;
            info!(app = %self.app_id, "recovery terminated, this is a shiny new application");
            return;
        }

        let doe = self.fs.doe.load(&self.app_id, &description).unwrap_or_else(|e| {
            warn!(app = %self.app_id, "unable to load the doe: {e}");
            DoeModel::new()
        });
        let cluster = self.fs.cluster.load(&self.app_id).unwrap_or_else(|e| {
            warn!(app = %self.app_id, "unable to load the cluster: {e}");
            ClusterModel::new()
        });
        let models_ok = description
            .metrics
            .iter()
            .all(|m| self.fs.model.is_model_valid(&self.app_id, &m.name));
        let prediction =
            self.fs.prediction.load(&self.app_id, &description).unwrap_or_else(|e| {
                warn!(app = %self.app_id, "unable to load the prediction: {e}");
                PredictionModel::new()
            });

        let mut st = self.state.lock();
        let mut status = ApplicationStatus::WITH_INFORMATION;
        if !doe.is_empty() {
            status |= ApplicationStatus::WITH_DOE | ApplicationStatus::EXPLORING;
        } else if doe.total_configurations() > 0 {
            // exploration completed in a previous run
            status |= ApplicationStatus::WITH_DOE;
        }
        if !cluster.is_empty() {
            status |= ApplicationStatus::WITH_CLUSTER;
        }
        if models_ok {
            status |= ApplicationStatus::WITH_MODEL;
        }
        if !prediction.is_empty() {
            status |= ApplicationStatus::WITH_PREDICTION;
        }

        st.num_configurations_per_iteration = doe.remaining_total();
        st.num_configurations_sent_per_iteration = 0;
        st.description = description;
        st.doe = doe;
        st.cluster = cluster;
        st.prediction = prediction;
        st.status = status;
        info!(app = %self.app_id, status = %status, "recovery process terminated");
    }

    /// Any artifact without a usable description means a half-written
    /// previous run.
    fn storage_has_leftovers(&self) -> bool {
        let doe_leftover = self.fs.doe.load_total(&self.app_id).map(|t| t > 0).unwrap_or(true)
            || self
                .fs
                .doe
                .load(&self.app_id, &BlockDescription::default())
                .map(|d| !d.is_empty())
                .unwrap_or(true);
        let cluster_leftover =
            self.fs.cluster.load(&self.app_id).map(|c| !c.is_empty()).unwrap_or(true);
        let prediction_leftover = match self
            .fs
            .prediction
            .load(&self.app_id, &BlockDescription::default())
        {
            Ok(prediction) => !prediction.is_empty(),
            Err(_) => true,
        };
        doe_leftover || cluster_leftover || prediction_leftover
    }

    /// Forget everything in memory so the next event replays storage.
    fn reset_for_recovery(&self) {
        warn!(app = %self.app_id, "resetting the handler, the next event replays storage");
        let mut st = self.state.lock();
        let clients = std::mem::take(&mut st.active_clients);
        *st = HandlerState::new();
        st.active_clients = clients;
    }

    // -- description ingestion --

    /// Parse and persist the first client's description. Returns `false`
    /// when the handler cannot advance (bad payload, storage failure).
    async fn install_description(&self, client_id: &str, payload: &str) -> bool {
        if payload.is_empty() {
            trace!(app = %self.app_id, client = client_id, "welcome without a description while clueless");
            return false;
        }

        let description = match BlockDescription::parse(payload) {
            Ok(description) => description,
            Err(e) => {
                warn!(app = %self.app_id, client = client_id, "unusable description: {e}");
                self.abort_client(client_id).await;
                return false;
            }
        };

        // description first, then the trace table: the documented container
        // write order
        if let Err(e) = self
            .fs
            .description
            .store(&self.app_id, &description)
            .and_then(|()| self.fs.observation.create_table(&self.app_id, &description))
        {
            warn!(app = %self.app_id, "unable to persist the description: {e}");
            self.abort_client(client_id).await;
            return false;
        }

        let mut st = self.state.lock();
        info!(app = %self.app_id, "application description received and stored");
        st.description = description;
        st.status.remove(ApplicationStatus::CLUELESS);
        st.status.insert(ApplicationStatus::WITH_INFORMATION);
        true
    }

    /// Later clients re-declaring the block: drift is logged and ignored.
    fn check_redeclaration(&self, payload: &str) {
        match BlockDescription::parse(payload) {
            Ok(description) => {
                let st = self.state.lock();
                if !st.description.is_compatible_with(&description) {
                    warn!(app = %self.app_id, "description mismatch with the stored one, ignoring the new declaration");
                }
            }
            Err(e) => {
                debug!(app = %self.app_id, "ignoring an unparsable re-declaration: {e}");
            }
        }
    }

    // -- outgoing messages --

    async fn send(&self, message: Message) {
        if let Err(e) = self.remote.send_message(message).await {
            warn!(app = %self.app_id, "unable to send a message: {e}");
        }
    }

    async fn abort_client(&self, client_id: &str) {
        self.send(Message::new(messages::abort_topic(&self.app_id, client_id), "")).await;
    }

    fn launcher(&self, plugin_name: &str) -> Arc<Launcher> {
        Arc::clone(
            self.launchers
                .lock()
                .entry(plugin_name.to_string())
                .or_insert_with(|| {
                    Arc::new(Launcher::new(&self.launcher_configuration, plugin_name))
                }),
        )
    }
}

#[cfg(test)]
#[path = "../handler_tests/mod.rs"]
mod tests;
