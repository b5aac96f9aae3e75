// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline driver: decides which plugin is due from the status bits and
//! the artifact validity, runs it without the state lock, and commits the
//! resulting transition.

use super::{messages, ApplicationHandler, HandlerError, HandlerState};
use crate::launcher::{Launcher, PluginConfiguration};
use agora_core::{ApplicationStatus, Message};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineAction {
    Doe,
    Cluster,
    Models,
    Prediction,
}

impl PipelineAction {
    fn building_bit(self) -> ApplicationStatus {
        match self {
            Self::Doe => ApplicationStatus::BUILDING_DOE,
            Self::Cluster => ApplicationStatus::BUILDING_CLUSTER,
            Self::Models => ApplicationStatus::BUILDING_MODEL,
            Self::Prediction => ApplicationStatus::BUILDING_PREDICTION,
        }
    }
}

/// Pick the stage that is due, marking its BUILDING_* bit so concurrent
/// callers skip it. Must run under the state lock.
fn next_action(st: &mut HandlerState) -> Option<PipelineAction> {
    if !st.status.contains(ApplicationStatus::WITH_INFORMATION) {
        return None;
    }
    let features = st.description.has_features();
    let status = st.status;

    let action = if !status
        .intersects(ApplicationStatus::WITH_DOE | ApplicationStatus::BUILDING_DOE)
    {
        PipelineAction::Doe
    } else if features
        && status.contains(ApplicationStatus::WITH_DOE)
        && !status
            .intersects(ApplicationStatus::WITH_CLUSTER | ApplicationStatus::BUILDING_CLUSTER)
    {
        // the cluster plugin runs alongside the exploration
        PipelineAction::Cluster
    } else {
        let cluster_ready = !features || status.contains(ApplicationStatus::WITH_CLUSTER);
        if status.contains(ApplicationStatus::WITH_DOE)
            && !status.contains(ApplicationStatus::EXPLORING)
            && cluster_ready
            && !status
                .intersects(ApplicationStatus::WITH_MODEL | ApplicationStatus::BUILDING_MODEL)
        {
            PipelineAction::Models
        } else if status.contains(ApplicationStatus::WITH_MODEL)
            && cluster_ready
            && !status.intersects(
                ApplicationStatus::WITH_PREDICTION | ApplicationStatus::BUILDING_PREDICTION,
            )
        {
            PipelineAction::Prediction
        } else {
            return None;
        }
    };

    st.status.insert(action.building_bit());
    Some(action)
}

impl ApplicationHandler {
    /// Run every pipeline stage that is due, one after the other. A plugin
    /// failure aborts the triggering client and leaves the handler in a
    /// recovery-capable state; there is no automatic retry.
    pub(crate) async fn drive_pipeline(&self, client_id: &str) {
        loop {
            let action = {
                let mut st = self.state.lock();
                next_action(&mut st)
            };
            let Some(action) = action else { break };

            let result = match action {
                PipelineAction::Doe => self.run_doe().await,
                PipelineAction::Cluster => self.run_cluster().await,
                PipelineAction::Models => self.run_models().await,
                PipelineAction::Prediction => self.run_prediction().await,
            };

            if let Err(e) = result {
                self.handle_plugin_failure(action, client_id, &e).await;
                break;
            }
        }
    }

    async fn handle_plugin_failure(
        &self,
        action: PipelineAction,
        client_id: &str,
        error: &HandlerError,
    ) {
        warn!(app = %self.app_id, ?action, "plugin stage failed: {error}");
        self.abort_client(client_id).await;

        let mut st = self.state.lock();
        st.status.remove(action.building_bit());
        if action == PipelineAction::Doe {
            // back to the last at-rest state; the next welcome relaunches
            st.status = ApplicationStatus::WITH_INFORMATION;
            st.doe.clear();
        }
    }

    /// Launch the DoE plugin, install its plan, and hand every active client
    /// its first configuration.
    async fn run_doe(&self) -> Result<(), HandlerError> {
        info!(app = %self.app_id, "building the doe");
        let description = self.state.lock().description.clone();

        let launcher = self.launcher("doe");
        launcher.initialize_workspace(&self.app_id)?;
        let child = launcher
            .launch(PluginConfiguration::new("doe", self.fs.doe_env(&self.app_id)))?;
        Launcher::wait(child).await?;

        let doe = self.fs.doe.load(&self.app_id, &description)?;
        if doe.is_empty() {
            return Err(HandlerError::EmptyDoe);
        }

        let dispatch: Vec<Message> = {
            let mut st = self.state.lock();
            st.status.remove(ApplicationStatus::BUILDING_DOE);
            st.status.insert(ApplicationStatus::WITH_DOE | ApplicationStatus::EXPLORING);
            st.num_configurations_per_iteration = doe.remaining_total();
            st.num_configurations_sent_per_iteration = 0;
            st.doe = doe;

            info!(app = %self.app_id, "starting the design space exploration");
            let clients: Vec<String> = st.active_clients.iter().cloned().collect();
            clients
                .into_iter()
                .filter_map(|client| {
                    messages::next_configuration(&mut st, &self.app_id, &client)
                })
                .collect()
        };

        for message in dispatch {
            self.send(message).await;
        }
        Ok(())
    }

    /// Launch the clustering plugin; it runs while clients keep exploring.
    async fn run_cluster(&self) -> Result<(), HandlerError> {
        info!(app = %self.app_id, "building the cluster of the input features");

        let launcher = self.launcher("cluster");
        launcher.initialize_workspace(&self.app_id)?;
        let child = launcher
            .launch(PluginConfiguration::new("cluster", self.fs.cluster_env(&self.app_id)))?;
        Launcher::wait(child).await?;

        let cluster = self.fs.cluster.load(&self.app_id)?;
        if cluster.is_empty() {
            return Err(HandlerError::EmptyCluster);
        }

        let mut st = self.state.lock();
        st.status.remove(ApplicationStatus::BUILDING_CLUSTER);
        st.status.insert(ApplicationStatus::WITH_CLUSTER);
        st.cluster = cluster;
        info!(app = %self.app_id, "now we have the feature centroids");
        Ok(())
    }

    /// Launch one model plugin per metric, sequentially, and verify every
    /// artifact landed.
    async fn run_models(&self) -> Result<(), HandlerError> {
        let (metrics, iteration_number) = {
            let st = self.state.lock();
            (st.description.metrics.clone(), st.iteration_number)
        };
        info!(app = %self.app_id, iteration_number, "building the models");

        self.fs.model.create_models_dir(&self.app_id)?;
        for metric in &metrics {
            let launcher = self.launcher(&metric.prediction_plugin);
            launcher.initialize_workspace(&self.app_id)?;
            let child = launcher.launch(PluginConfiguration::new(
                format!("model_{}", metric.name),
                self.fs.model_env(&self.app_id, &metric.name, iteration_number),
            ))?;
            Launcher::wait(child).await?;
        }

        if let Some(metric) =
            metrics.iter().find(|m| !self.fs.model.is_model_valid(&self.app_id, &m.name))
        {
            return Err(HandlerError::InvalidModel(metric.name.clone()));
        }

        let mut st = self.state.lock();
        st.status.remove(ApplicationStatus::BUILDING_MODEL);
        st.status.insert(ApplicationStatus::WITH_MODEL);
        st.iteration_number += 1;
        info!(app = %self.app_id, "now we have a model for every metric");
        Ok(())
    }

    /// Launch the prediction plugin, install its table, and broadcast it to
    /// every client of the application.
    async fn run_prediction(&self) -> Result<(), HandlerError> {
        info!(app = %self.app_id, "building the prediction table");
        let description = self.state.lock().description.clone();

        let launcher = self.launcher("prediction");
        launcher.initialize_workspace(&self.app_id)?;
        let child = launcher.launch(PluginConfiguration::new(
            "prediction",
            self.fs.prediction_env(&self.app_id),
        ))?;
        Launcher::wait(child).await?;

        let prediction = self.fs.prediction.load(&self.app_id, &description)?;
        if prediction.is_empty() {
            return Err(HandlerError::EmptyPrediction);
        }

        let broadcast = {
            let mut st = self.state.lock();
            st.status.remove(ApplicationStatus::BUILDING_PREDICTION);
            st.status.insert(ApplicationStatus::WITH_PREDICTION);
            st.prediction = prediction;
            info!(app = %self.app_id, "now we have a prediction table, broadcasting it");
            Message::new(
                messages::prediction_broadcast_topic(&self.app_id),
                st.prediction.to_json(),
            )
        };
        self.send(broadcast).await;
        Ok(())
    }
}
