// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model store: opaque per-metric artifacts written by the model plugins.
//!
//! Unlike the tabular stores this one only hands out filesystem paths; the
//! artifacts themselves are produced and consumed by plugins.

use crate::error::StorageError;
use agora_core::ApplicationId;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ModelStore {
    models_root: PathBuf,
}

impl ModelStore {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        Self { models_root: models_root.into() }
    }

    /// Directory holding every metric's artifact for an application.
    pub fn get_models_path(&self, app_id: &ApplicationId) -> String {
        self.models_root.join(app_id.path()).display().to_string()
    }

    /// Artifact path for one metric.
    pub fn get_model_name(&self, app_id: &ApplicationId, metric: &str) -> String {
        self.models_root
            .join(app_id.path())
            .join(format!("{metric}_model.data"))
            .display()
            .to_string()
    }

    /// Make sure the per-application model directory exists before a plugin
    /// is pointed at it.
    pub fn create_models_dir(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        let dir = self.models_root.join(app_id.path());
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir, e))
    }

    /// A model is usable when the plugin left a non-empty artifact behind.
    pub fn is_model_valid(&self, app_id: &ApplicationId, metric: &str) -> bool {
        std::fs::metadata(self.get_model_name(app_id, metric))
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    pub fn erase(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        let dir = self.models_root.join(app_id.path());
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(dir, e)),
        }
    }
}
