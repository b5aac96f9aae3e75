// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prediction model: the table the prediction plugin produces and the server
//! broadcasts to clients.

use crate::doe::Configuration;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Predicted value of one metric: mean and standard deviation, both kept as
/// the strings the plugin wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricValue {
    pub avg: String,
    pub std: String,
}

/// Feature name → centroid value.
pub type FeatureVector = BTreeMap<String, String>;

/// Metric name → predicted value.
pub type PredictedResult = BTreeMap<String, MetricValue>;

/// Three parallel maps keyed by prediction id.
///
/// Invariant: every id in `predicted_results` has a matching entry in
/// `configurations` (and in `features` when the block declares features).
/// `add_result` is the only way in, so the invariant holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionModel {
    configurations: IndexMap<String, Configuration>,
    features: IndexMap<String, FeatureVector>,
    predicted_results: IndexMap<String, PredictedResult>,
}

impl PredictionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one prediction row. Returns `true` when the id was
    /// seen for the first time.
    pub fn add_result(
        &mut self,
        prediction_id: impl Into<String>,
        configuration: Configuration,
        features: FeatureVector,
        result: PredictedResult,
    ) -> bool {
        let prediction_id = prediction_id.into();
        let fresh = self
            .configurations
            .insert(prediction_id.clone(), configuration)
            .is_none();
        if !features.is_empty() {
            self.features.insert(prediction_id.clone(), features);
        }
        self.predicted_results.insert(prediction_id, result);
        fresh
    }

    pub fn remove_result(&mut self, prediction_id: &str) {
        self.configurations.shift_remove(prediction_id);
        self.features.shift_remove(prediction_id);
        self.predicted_results.shift_remove(prediction_id);
    }

    pub fn clear(&mut self) {
        self.configurations.clear();
        self.features.clear();
        self.predicted_results.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.predicted_results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicted_results.len()
    }

    pub fn configuration(&self, prediction_id: &str) -> Option<&Configuration> {
        self.configurations.get(prediction_id)
    }

    pub fn features_of(&self, prediction_id: &str) -> Option<&FeatureVector> {
        self.features.get(prediction_id)
    }

    pub fn result(&self, prediction_id: &str) -> Option<&PredictedResult> {
        self.predicted_results.get(prediction_id)
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = &String> {
        self.predicted_results.keys()
    }

    /// Render the broadcast payload: one JSON object keyed by prediction id,
    /// each row carrying its configuration, centroid (if any), and predicted
    /// metric values.
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct Row<'a> {
            configuration: &'a Configuration,
            #[serde(skip_serializing_if = "Option::is_none")]
            features: Option<&'a FeatureVector>,
            predicted: &'a PredictedResult,
        }

        let table: IndexMap<&String, Row<'_>> = self
            .predicted_results
            .iter()
            .filter_map(|(id, predicted)| {
                self.configurations.get(id).map(|configuration| {
                    (id, Row { configuration, features: self.features.get(id), predicted })
                })
            })
            .collect();

        serde_json::to_string(&table).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
#[path = "prediction_tests.rs"]
mod tests;
