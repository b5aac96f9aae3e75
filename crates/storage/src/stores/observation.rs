// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observation store: the append-only exploration trace.

use crate::container;
use crate::error::StorageError;
use agora_core::{ApplicationId, BlockDescription, Observation};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ObservationStore {
    root: PathBuf,
}

impl ObservationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn get_type(&self) -> &'static str {
        "csv"
    }

    pub fn get_observation_name(&self, app_id: &ApplicationId) -> String {
        container::csv_container_path(&self.root, app_id, "observations").display().to_string()
    }

    /// Create the trace container with its header so plugins can rely on the
    /// column order even before the first observation lands.
    pub fn create_table(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
    ) -> Result<(), StorageError> {
        container::replace(
            Path::new(&self.get_observation_name(app_id)),
            &self.header(description),
            std::iter::empty(),
        )
    }

    /// Append one observation row. Rows are never mutated afterwards.
    pub fn insert(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
        client_id: &str,
        seconds: i64,
        nanoseconds: i64,
        observation: &Observation,
    ) -> Result<(), StorageError> {
        let mut row =
            vec![client_id.to_string(), seconds.to_string(), nanoseconds.to_string()];
        row.extend(
            description
                .features
                .iter()
                .map(|f| observation.features.get(&f.name).cloned().unwrap_or_default()),
        );
        row.extend(
            description
                .knobs
                .iter()
                .map(|k| observation.configuration.get(&k.name).cloned().unwrap_or_default()),
        );
        row.extend(
            description
                .metrics
                .iter()
                .map(|m| observation.metrics.get(&m.name).cloned().unwrap_or_default()),
        );

        container::append(
            Path::new(&self.get_observation_name(app_id)),
            &self.header(description),
            &row,
        )
    }

    /// Number of rows currently in the trace.
    pub fn count(&self, app_id: &ApplicationId) -> Result<usize, StorageError> {
        Ok(container::read(Path::new(&self.get_observation_name(app_id)))?
            .map(|(_, rows)| rows.len())
            .unwrap_or(0))
    }

    pub fn erase(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        container::erase(Path::new(&self.get_observation_name(app_id)))
    }

    fn header(&self, description: &BlockDescription) -> Vec<String> {
        let mut header =
            vec!["client_id".to_string(), "sec".to_string(), "nanosec".to_string()];
        header.extend(description.feature_names().iter().map(|n| n.to_string()));
        header.extend(description.knob_names().iter().map(|n| n.to_string()));
        header.extend(description.metric_names().iter().map(|n| n.to_string()));
        header
    }
}

#[cfg(test)]
#[path = "observation_tests.rs"]
mod tests;
