// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prediction store: the table the prediction plugin writes and the server
//! broadcasts.

use crate::container;
use crate::error::StorageError;
use agora_core::{
    ApplicationId, BlockDescription, Configuration, FeatureVector, MetricValue, PredictedResult,
    PredictionModel,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PredictionStore {
    root: PathBuf,
}

impl PredictionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn get_type(&self) -> &'static str {
        "csv"
    }

    pub fn get_prediction_name(&self, app_id: &ApplicationId) -> String {
        container::csv_container_path(&self.root, app_id, "predictions").display().to_string()
    }

    pub fn store(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
        prediction: &PredictionModel,
    ) -> Result<(), StorageError> {
        let header = self.header(description);

        let rows: Vec<Vec<String>> = prediction
            .iter_ids()
            .map(|id| {
                let mut row = vec![id.clone()];
                let configuration = prediction.configuration(id);
                row.extend(description.knobs.iter().map(|k| {
                    configuration
                        .and_then(|c| c.get(&k.name).cloned())
                        .unwrap_or_default()
                }));
                let features = prediction.features_of(id);
                row.extend(description.features.iter().map(|f| {
                    features.and_then(|v| v.get(&f.name).cloned()).unwrap_or_default()
                }));
                let result = prediction.result(id);
                for metric in &description.metrics {
                    let value = result.and_then(|r| r.get(&metric.name));
                    row.push(value.map(|v| v.avg.clone()).unwrap_or_default());
                    row.push(value.map(|v| v.std.clone()).unwrap_or_default());
                }
                row
            })
            .collect();

        container::replace(Path::new(&self.get_prediction_name(app_id)), &header, rows)
    }

    pub fn load(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
    ) -> Result<PredictionModel, StorageError> {
        let mut prediction = PredictionModel::new();
        let path = self.get_prediction_name(app_id);

        let Some((header, rows)) = container::read(Path::new(&path))? else {
            return Ok(prediction);
        };
        let expected = self.header(description);
        if header != expected {
            return Err(StorageError::corrupt(
                &path,
                "prediction columns do not match description",
            ));
        }

        for row in rows {
            if row.len() != header.len() {
                return Err(StorageError::corrupt(&path, "prediction row width mismatch"));
            }
            let mut fields = row.into_iter();
            let Some(id) = fields.next() else { continue };

            let mut configuration = Configuration::new();
            for knob in &description.knobs {
                if let Some(value) = fields.next() {
                    configuration.insert(knob.name.clone(), value);
                }
            }

            let mut features = FeatureVector::new();
            for feature in &description.features {
                if let Some(value) = fields.next() {
                    features.insert(feature.name.clone(), value);
                }
            }

            let mut result = PredictedResult::new();
            for metric in &description.metrics {
                if let (Some(avg), Some(std)) = (fields.next(), fields.next()) {
                    result.insert(metric.name.clone(), MetricValue { avg, std });
                }
            }

            prediction.add_result(id, configuration, features, result);
        }

        Ok(prediction)
    }

    pub fn erase(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        container::erase(Path::new(&self.get_prediction_name(app_id)))
    }

    fn header(&self, description: &BlockDescription) -> Vec<String> {
        let mut header = vec!["prediction_id".to_string()];
        header.extend(description.knob_names().iter().map(|n| n.to_string()));
        header.extend(description.feature_names().iter().map(|n| n.to_string()));
        for metric in &description.metrics {
            header.push(format!("{}_avg", metric.name));
            header.push(format!("{}_std", metric.name));
        }
        header
    }
}

#[cfg(test)]
#[path = "prediction_tests.rs"]
mod tests;
