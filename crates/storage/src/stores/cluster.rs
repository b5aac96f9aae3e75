// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster store: feature-space centroids.

use crate::container;
use crate::error::StorageError;
use agora_core::{ApplicationId, BlockDescription, ClusterModel};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ClusterStore {
    root: PathBuf,
}

impl ClusterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn get_type(&self) -> &'static str {
        "csv"
    }

    pub fn get_cluster_name(&self, app_id: &ApplicationId) -> String {
        container::csv_container_path(&self.root, app_id, "cluster").display().to_string()
    }

    pub fn store(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
        cluster: &ClusterModel,
    ) -> Result<(), StorageError> {
        let mut header = vec!["centroid_id".to_string()];
        header.extend(description.feature_names().iter().map(|n| n.to_string()));

        let rows = cluster.iter().map(|(id, values)| {
            let mut row = vec![id.clone()];
            row.extend(values.iter().cloned());
            row
        });

        container::replace(Path::new(&self.get_cluster_name(app_id)), &header, rows)
    }

    pub fn load(&self, app_id: &ApplicationId) -> Result<ClusterModel, StorageError> {
        let mut cluster = ClusterModel::new();
        if let Some((_, rows)) = container::read(Path::new(&self.get_cluster_name(app_id)))? {
            for row in rows {
                let mut fields = row.into_iter();
                if let Some(id) = fields.next() {
                    cluster.add_centroid(id, fields.collect());
                }
            }
        }
        Ok(cluster)
    }

    pub fn erase(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        container::erase(Path::new(&self.get_cluster_name(app_id)))
    }
}
