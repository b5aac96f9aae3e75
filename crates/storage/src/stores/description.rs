// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Description store: knobs, features, metrics, monitors, and the parameter
//! containers handed to plugins.

use crate::container;
use crate::error::StorageError;
use agora_core::{
    ApplicationId, BlockDescription, Feature, FeatureComparison, Knob, Metric, Monitor, ValueType,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const VALUE_SEPARATOR: char = ';';

#[derive(Debug, Clone)]
pub struct DescriptionStore {
    root: PathBuf,
}

impl DescriptionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn get_type(&self) -> &'static str {
        "csv"
    }

    pub fn get_knobs_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "knobs")
    }

    pub fn get_features_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "features")
    }

    pub fn get_metrics_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "metrics")
    }

    pub fn get_monitors_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "monitors")
    }

    pub fn get_properties_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "properties")
    }

    pub fn get_doe_parameters_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "doe_parameters")
    }

    pub fn get_clustering_parameters_name(&self, app_id: &ApplicationId) -> String {
        self.container(app_id, "cluster_parameters")
    }

    pub fn get_model_parameters_name(&self, app_id: &ApplicationId, metric: &str) -> String {
        self.container(app_id, &format!("model_parameters_{metric}"))
    }

    /// Persist every description container. The properties container is
    /// written first so a recovering handler that finds any other container
    /// can rely on the description being complete.
    pub fn store(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
    ) -> Result<(), StorageError> {
        container::replace(
            Path::new(&self.get_properties_name(app_id)),
            &header(&["property", "value"]),
            vec![vec!["block".to_string(), app_id.block.clone()]],
        )?;

        container::replace(
            Path::new(&self.get_knobs_name(app_id)),
            &header(&["name", "type", "values"]),
            description.knobs.iter().map(|k| {
                vec![
                    k.name.clone(),
                    k.value_type.as_str().to_string(),
                    k.values.join(&VALUE_SEPARATOR.to_string()),
                ]
            }),
        )?;

        container::replace(
            Path::new(&self.get_features_name(app_id)),
            &header(&["name", "type", "comparison"]),
            description.features.iter().map(|f| {
                vec![
                    f.name.clone(),
                    f.value_type.as_str().to_string(),
                    f.comparison.as_str().to_string(),
                ]
            }),
        )?;

        container::replace(
            Path::new(&self.get_metrics_name(app_id)),
            &header(&["name", "type", "distribution", "inertia", "prediction_plugin"]),
            description.metrics.iter().map(|m| {
                vec![
                    m.name.clone(),
                    m.value_type.as_str().to_string(),
                    m.distribution.to_string(),
                    m.inertia.to_string(),
                    m.prediction_plugin.clone(),
                ]
            }),
        )?;

        container::replace(
            Path::new(&self.get_monitors_name(app_id)),
            &header(&["name", "log"]),
            description
                .monitors
                .iter()
                .map(|m| vec![m.name.clone(), m.log.join(&VALUE_SEPARATOR.to_string())]),
        )?;

        self.store_parameters(&self.get_doe_parameters_name(app_id), &description.doe_parameters)?;
        self.store_parameters(
            &self.get_clustering_parameters_name(app_id),
            &description.clustering_parameters,
        )?;
        for metric in &description.metrics {
            self.store_parameters(
                &self.get_model_parameters_name(app_id, &metric.name),
                &metric.parameters,
            )?;
        }

        Ok(())
    }

    /// Load the persisted description. Missing containers yield empty
    /// sections; an entirely unknown application loads as the default
    /// (empty) description.
    pub fn load(&self, app_id: &ApplicationId) -> Result<BlockDescription, StorageError> {
        let mut description = BlockDescription::default();

        if let Some((_, rows)) = container::read(Path::new(&self.get_knobs_name(app_id)))? {
            for row in rows {
                let [name, ty, values] = three(&self.get_knobs_name(app_id), &row)?;
                description.knobs.push(Knob {
                    name,
                    value_type: parse_type(&self.get_knobs_name(app_id), &ty)?,
                    values: split_values(&values),
                });
            }
        }

        if let Some((_, rows)) = container::read(Path::new(&self.get_features_name(app_id)))? {
            for row in rows {
                let [name, ty, comparison] = three(&self.get_features_name(app_id), &row)?;
                description.features.push(Feature {
                    name,
                    value_type: parse_type(&self.get_features_name(app_id), &ty)?,
                    comparison: FeatureComparison::parse(&comparison),
                });
            }
        }

        if let Some((_, rows)) = container::read(Path::new(&self.get_metrics_name(app_id)))? {
            let path = self.get_metrics_name(app_id);
            for row in rows {
                let mut fields = row.into_iter();
                let (Some(name), Some(ty), Some(distribution), Some(inertia), Some(plugin)) = (
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                ) else {
                    return Err(StorageError::corrupt(&path, "short metric row"));
                };
                description.metrics.push(Metric {
                    name,
                    value_type: parse_type(&path, &ty)?,
                    distribution: distribution == "true",
                    inertia: inertia.parse().unwrap_or(0),
                    prediction_plugin: plugin,
                    parameters: BTreeMap::new(),
                });
            }
        }

        if let Some((_, rows)) = container::read(Path::new(&self.get_monitors_name(app_id)))? {
            for row in rows {
                let mut fields = row.into_iter();
                if let Some(name) = fields.next() {
                    description.monitors.push(Monitor {
                        name,
                        log: fields.next().map(|l| split_values(&l)).unwrap_or_default(),
                    });
                }
            }
        }

        description.doe_parameters =
            self.load_parameters(&self.get_doe_parameters_name(app_id))?;
        description.clustering_parameters =
            self.load_parameters(&self.get_clustering_parameters_name(app_id))?;
        let metric_names: Vec<String> =
            description.metrics.iter().map(|m| m.name.clone()).collect();
        for name in metric_names {
            let parameters =
                self.load_parameters(&self.get_model_parameters_name(app_id, &name))?;
            if let Some(metric) = description.metrics.iter_mut().find(|m| m.name == name) {
                metric.parameters = parameters;
            }
        }

        Ok(description)
    }

    pub fn erase(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        // model parameter containers need the metric list before it is gone
        if let Ok(description) = self.load(app_id) {
            for metric in &description.metrics {
                container::erase(Path::new(
                    &self.get_model_parameters_name(app_id, &metric.name),
                ))?;
            }
        }

        for name in [
            self.get_properties_name(app_id),
            self.get_knobs_name(app_id),
            self.get_features_name(app_id),
            self.get_metrics_name(app_id),
            self.get_monitors_name(app_id),
            self.get_doe_parameters_name(app_id),
            self.get_clustering_parameters_name(app_id),
        ] {
            container::erase(Path::new(&name))?;
        }
        Ok(())
    }

    fn container(&self, app_id: &ApplicationId, name: &str) -> String {
        container::csv_container_path(&self.root, app_id, name).display().to_string()
    }

    fn store_parameters(
        &self,
        name: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        container::replace(
            Path::new(name),
            &header(&["parameter", "value"]),
            parameters.iter().map(|(k, v)| vec![k.clone(), v.clone()]),
        )
    }

    fn load_parameters(&self, name: &str) -> Result<BTreeMap<String, String>, StorageError> {
        let mut parameters = BTreeMap::new();
        if let Some((_, rows)) = container::read(Path::new(name))? {
            for row in rows {
                let mut fields = row.into_iter();
                if let (Some(key), Some(value)) = (fields.next(), fields.next()) {
                    parameters.insert(key, value);
                }
            }
        }
        Ok(parameters)
    }
}

fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn three(path: &str, row: &[String]) -> Result<[String; 3], StorageError> {
    match row {
        [a, b, c, ..] => Ok([a.clone(), b.clone(), c.clone()]),
        _ => Err(StorageError::corrupt(path, "short row")),
    }
}

fn parse_type(path: &str, value: &str) -> Result<ValueType, StorageError> {
    ValueType::parse(value).map_err(|e| StorageError::corrupt(path, e.to_string()))
}

fn split_values(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(VALUE_SEPARATOR).map(String::from).collect()
    }
}

#[cfg(test)]
#[path = "description_tests.rs"]
mod tests;
