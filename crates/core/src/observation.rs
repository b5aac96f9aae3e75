// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observation body parsing.

use crate::description::BlockDescription;
use crate::doe::Configuration;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservationError {
    #[error("observation body '{0}' is not features@configuration@metrics")]
    BadShape(String),

    #[error("observation segment entry '{0}' is not name=value")]
    BadEntry(String),

    #[error("observation {section} names {got:?} do not match the declared {expected:?}")]
    NameMismatch { section: &'static str, got: Vec<String>, expected: Vec<String> },
}

/// One decoded runtime observation: the feature values the client saw, the
/// configuration it ran, and the metric values it measured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Observation {
    pub features: BTreeMap<String, String>,
    pub configuration: Configuration,
    pub metrics: BTreeMap<String, String>,
}

impl Observation {
    /// Parse the `<features?>@<configuration>@<metrics>` body against the
    /// block description. Each segment is a comma-separated list of
    /// `name=value` pairs; the features segment is empty exactly when the
    /// block declares no features.
    pub fn parse(body: &str, description: &BlockDescription) -> Result<Self, ObservationError> {
        let mut segments = body.split('@');
        let (Some(features), Some(configuration), Some(metrics), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(ObservationError::BadShape(body.to_string()));
        };

        let observation = Self {
            features: parse_pairs(features)?,
            configuration: parse_pairs(configuration)?,
            metrics: parse_pairs(metrics)?,
        };

        check_names(
            "features",
            observation.features.keys(),
            description.feature_names(),
        )?;
        check_names(
            "configuration",
            observation.configuration.keys(),
            description.knob_names(),
        )?;
        check_names("metrics", observation.metrics.keys(), description.metric_names())?;

        Ok(observation)
    }

    /// Feature values in the description's declaration order.
    pub fn feature_values(&self, description: &BlockDescription) -> Vec<String> {
        description
            .features
            .iter()
            .filter_map(|f| self.features.get(&f.name).cloned())
            .collect()
    }
}

fn parse_pairs(segment: &str) -> Result<BTreeMap<String, String>, ObservationError> {
    let mut pairs = BTreeMap::new();
    for entry in segment.split(',').filter(|e| !e.is_empty()) {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| ObservationError::BadEntry(entry.to_string()))?;
        pairs.insert(name.to_string(), value.to_string());
    }
    Ok(pairs)
}

fn check_names<'a>(
    section: &'static str,
    got: impl Iterator<Item = &'a String>,
    expected: Vec<&str>,
) -> Result<(), ObservationError> {
    let mut got: Vec<String> = got.cloned().collect();
    let mut expected: Vec<String> = expected.into_iter().map(String::from).collect();
    got.sort();
    expected.sort();

    if got == expected {
        Ok(())
    } else {
        Err(ObservationError::NameMismatch { section, got, expected })
    }
}

#[cfg(test)]
#[path = "observation_tests.rs"]
mod tests;
