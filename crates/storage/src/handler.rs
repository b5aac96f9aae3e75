// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The filesystem handler facade composing the six sub-stores.

use crate::error::StorageError;
use crate::stores::{
    ClusterStore, DescriptionStore, DoeStore, ModelStore, ObservationStore, PredictionStore,
};
use agora_core::ApplicationId;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Storage back-end selector. Only CSV exists today; the tag is also what
/// plugins receive so they can pick the matching adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Csv,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
        }
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            other => Err(format!("invalid storage implementation '{other}', should be one of [csv]")),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the handler keeps its containers.
#[derive(Debug, Clone)]
pub struct FsConfiguration {
    pub kind: StorageKind,
    /// Root of the tabular containers, one directory per application.
    pub storage_root: PathBuf,
    /// Separate root for the opaque model artifacts.
    pub models_root: PathBuf,
}

impl FsConfiguration {
    pub fn new(storage_root: impl Into<PathBuf>, models_root: impl Into<PathBuf>) -> Self {
        Self { kind: StorageKind::Csv, storage_root: storage_root.into(), models_root: models_root.into() }
    }
}

/// Ordered `KEY → VALUE` pairs for a plugin environment file.
pub type PluginProperties = Vec<(String, String)>;

/// Facade over the six sub-stores.
///
/// Clones share nothing but paths; every operation goes to the filesystem,
/// which is the synchronization point between workers and plugin processes.
#[derive(Debug, Clone)]
pub struct FsHandler {
    pub description: DescriptionStore,
    pub doe: DoeStore,
    pub observation: ObservationStore,
    pub model: ModelStore,
    pub cluster: ClusterStore,
    pub prediction: PredictionStore,
}

impl FsHandler {
    pub fn new(config: &FsConfiguration) -> Self {
        // only one back-end today; the match keeps the selection explicit
        match config.kind {
            StorageKind::Csv => Self {
                description: DescriptionStore::new(&config.storage_root),
                doe: DoeStore::new(&config.storage_root),
                observation: ObservationStore::new(&config.storage_root),
                model: ModelStore::new(&config.models_root),
                cluster: ClusterStore::new(&config.storage_root),
                prediction: PredictionStore::new(&config.storage_root),
            },
        }
    }

    /// Drop every container of an application, following the documented
    /// write order (description first, prediction last).
    pub fn erase_application(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        debug!(app = %app_id, "erasing every container");
        self.description.erase(app_id)?;
        self.doe.erase(app_id)?;
        self.cluster.erase(app_id)?;
        self.observation.erase(app_id)?;
        self.model.erase(app_id)?;
        self.prediction.erase(app_id)
    }

    /// Properties every plugin kind receives.
    fn env_preamble(&self, app_id: &ApplicationId) -> PluginProperties {
        vec![
            pair("AGORA_PROPERTIES_CONTAINER_NAME", self.description.get_properties_name(app_id)),
            pair("DESCRIPTION_FS_TYPE", self.description.get_type()),
            pair("DOE_FS_TYPE", self.doe.get_type()),
            pair("PREDICTION_FS_TYPE", self.prediction.get_type()),
            pair("CLUSTER_FS_TYPE", self.cluster.get_type()),
            pair("OBSERVATION_FS_TYPE", self.observation.get_type()),
        ]
    }

    /// Environment for the DoE plugin.
    pub fn doe_env(&self, app_id: &ApplicationId) -> PluginProperties {
        let mut properties = self.env_preamble(app_id);
        properties.push(pair("KNOBS_CONTAINER_NAME", self.description.get_knobs_name(app_id)));
        properties.push(pair("DOE_CONTAINER_NAME", self.doe.get_doe_name(app_id)));
        properties.push(pair(
            "DOE_PARAMETERS_CONTAINER_NAME",
            self.description.get_doe_parameters_name(app_id),
        ));
        properties.push(pair(
            "TOTAL_CONFIGURATIONS_CONTAINER_NAME",
            self.doe.get_total_configurations_name(app_id),
        ));
        properties
    }

    /// Environment for one metric's model plugin.
    pub fn model_env(
        &self,
        app_id: &ApplicationId,
        metric: &str,
        iteration_number: u32,
    ) -> PluginProperties {
        let mut properties = self.env_preamble(app_id);
        properties.push(pair("ITERATION_NUMBER", iteration_number.to_string()));
        properties.push(pair("METRIC_NAME", metric));
        properties.push(pair("KNOBS_CONTAINER_NAME", self.description.get_knobs_name(app_id)));
        properties
            .push(pair("FEATURES_CONTAINER_NAME", self.description.get_features_name(app_id)));
        properties.push(pair(
            "OBSERVATION_CONTAINER_NAME",
            self.observation.get_observation_name(app_id),
        ));
        properties.push(pair("MODEL_CONTAINER_NAME", self.model.get_model_name(app_id, metric)));
        properties.push(pair(
            "MODEL_PARAMETERS_CONTAINER_NAME",
            self.description.get_model_parameters_name(app_id, metric),
        ));
        properties
    }

    /// Environment for the clustering plugin.
    pub fn cluster_env(&self, app_id: &ApplicationId) -> PluginProperties {
        let mut properties = self.env_preamble(app_id);
        properties
            .push(pair("FEATURES_CONTAINER_NAME", self.description.get_features_name(app_id)));
        properties.push(pair(
            "OBSERVATION_CONTAINER_NAME",
            self.observation.get_observation_name(app_id),
        ));
        properties.push(pair("CLUSTER_CONTAINER_NAME", self.cluster.get_cluster_name(app_id)));
        properties.push(pair(
            "CLUSTER_PARAMETERS_CONTAINER_NAME",
            self.description.get_clustering_parameters_name(app_id),
        ));
        properties
    }

    /// Environment for the prediction plugin.
    pub fn prediction_env(&self, app_id: &ApplicationId) -> PluginProperties {
        let mut properties = self.env_preamble(app_id);
        properties.push(pair("KNOBS_CONTAINER_NAME", self.description.get_knobs_name(app_id)));
        properties
            .push(pair("METRICS_CONTAINER_NAME", self.description.get_metrics_name(app_id)));
        properties
            .push(pair("FEATURES_CONTAINER_NAME", self.description.get_features_name(app_id)));
        properties.push(pair(
            "TOTAL_CONFIGURATIONS_CONTAINER_NAME",
            self.doe.get_total_configurations_name(app_id),
        ));
        properties.push(pair("CLUSTER_CONTAINER_NAME", self.cluster.get_cluster_name(app_id)));
        properties
            .push(pair("PREDICTIONS_CONTAINER_NAME", self.prediction.get_prediction_name(app_id)));
        properties.push(pair("MODELS_CONTAINER", self.model.get_models_path(app_id)));
        properties
    }
}

fn pair(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
