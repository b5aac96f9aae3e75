// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster model: feature-space centroids produced by the clustering plugin.

use indexmap::IndexMap;

/// `centroid_id` → feature values in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterModel {
    centroids: IndexMap<String, Vec<String>>,
}

impl ClusterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_centroid(&mut self, centroid_id: impl Into<String>, values: Vec<String>) {
        self.centroids.insert(centroid_id.into(), values);
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn get(&self, centroid_id: &str) -> Option<&[String]> {
        self.centroids.get(centroid_id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.centroids.iter()
    }

    pub fn clear(&mut self) {
        self.centroids.clear();
    }
}
