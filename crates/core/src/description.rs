// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Block description: the tunable surface a client declares for an application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("description declares no {0}")]
    MissingSection(&'static str),

    #[error("unknown value type '{0}'")]
    UnknownType(String),

    #[error("info line '{0}' is truncated")]
    TruncatedLine(String),
}

/// Scalar type of a knob, metric, or feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
}

impl ValueType {
    pub fn parse(s: &str) -> Result<Self, DescriptionError> {
        match s {
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "uint8" => Ok(Self::Uint8),
            "uint16" => Ok(Self::Uint16),
            "uint32" => Ok(Self::Uint32),
            "uint64" => Ok(Self::Uint64),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            other => Err(DescriptionError::UnknownType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

/// How a feature value is compared against a centroid when a client picks
/// the closest cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureComparison {
    LessOrEqual,
    GreaterOrEqual,
    #[default]
    DontCare,
}

impl FeatureComparison {
    pub fn parse(s: &str) -> Self {
        match s {
            "le" | "less-or-equal" => Self::LessOrEqual,
            "ge" | "greater-or-equal" => Self::GreaterOrEqual,
            _ => Self::DontCare,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessOrEqual => "le",
            Self::GreaterOrEqual => "ge",
            Self::DontCare => "-",
        }
    }
}

/// A discrete tunable input: name, scalar type, admissible values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knob {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub values: Vec<String>,
}

/// An extra-functional property measured at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Whether the metric's runtime distribution is modeled.
    #[serde(default)]
    pub distribution: bool,
    /// Reactive inertia used by the client-side runtime.
    #[serde(default)]
    pub inertia: u32,
    /// Name of the plugin that fits this metric's model.
    #[serde(default = "default_prediction_plugin")]
    pub prediction_plugin: String,
    /// Free-form parameters forwarded to the model plugin.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

fn default_prediction_plugin() -> String {
    "model".to_string()
}

/// An input-data characteristic that influences metric behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub comparison: FeatureComparison,
}

/// A monitor declared by the client. Advisory: the server persists monitors
/// but never acts on them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Monitor {
    pub name: String,
    #[serde(default)]
    pub log: Vec<String>,
}

/// Everything the first client declares about an application block.
///
/// The server treats the first parsed description as authoritative; later
/// clients re-declaring an incompatible one are logged and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockDescription {
    #[serde(default)]
    pub knobs: Vec<Knob>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub monitors: Vec<Monitor>,
    /// Parameters forwarded to the DoE plugin (strategy, observation count…).
    #[serde(default)]
    pub doe_parameters: BTreeMap<String, String>,
    /// Parameters forwarded to the clustering plugin.
    #[serde(default)]
    pub clustering_parameters: BTreeMap<String, String>,
}

impl BlockDescription {
    /// Parse the wire form carried by `welcome` and `info` payloads:
    /// `@`-separated lines, each starting with a section header (`knob`,
    /// `feature`, `metric`, `doe`, `num_obser`) followed by
    /// whitespace-separated fields. The character set stays within the
    /// inbound sanitizer whitelist; JSON is used on the server-to-client
    /// direction only.
    pub fn parse(payload: &str) -> Result<Self, DescriptionError> {
        let mut description = Self::default();

        for line in payload.split('@').filter(|l| !l.trim().is_empty()) {
            let mut fields = line.split_whitespace();
            let header = fields.next().unwrap_or_default();
            let rest: Vec<&str> = fields.collect();

            match header {
                "knob" => {
                    let (name, ty) = two_fields(line, &rest)?;
                    description.knobs.push(Knob {
                        name: name.to_string(),
                        value_type: ValueType::parse(ty)?,
                        values: rest[2..].iter().map(|v| v.to_string()).collect(),
                    });
                }
                "feature" => {
                    let (name, ty) = two_fields(line, &rest)?;
                    description.features.push(Feature {
                        name: name.to_string(),
                        value_type: ValueType::parse(ty)?,
                        comparison: rest
                            .get(2)
                            .map(|c| FeatureComparison::parse(c))
                            .unwrap_or_default(),
                    });
                }
                "metric" => {
                    let (name, ty) = two_fields(line, &rest)?;
                    description.metrics.push(Metric {
                        name: name.to_string(),
                        value_type: ValueType::parse(ty)?,
                        distribution: false,
                        inertia: 0,
                        prediction_plugin: rest
                            .get(2)
                            .map(|p| p.to_string())
                            .unwrap_or_else(default_prediction_plugin),
                        parameters: BTreeMap::new(),
                    });
                }
                "doe" => {
                    if let Some(strategy) = rest.first() {
                        description
                            .doe_parameters
                            .insert("strategy".to_string(), strategy.to_string());
                    }
                }
                "num_obser" => {
                    if let Some(count) = rest.first() {
                        description
                            .doe_parameters
                            .insert("number_of_observations".to_string(), count.to_string());
                    }
                }
                // unknown section headers are skipped, not fatal
                _ => {}
            }
        }

        description.validate()?;
        Ok(description)
    }

    fn validate(&self) -> Result<(), DescriptionError> {
        if self.knobs.is_empty() {
            return Err(DescriptionError::MissingSection("knobs"));
        }
        if self.metrics.is_empty() {
            return Err(DescriptionError::MissingSection("metrics"));
        }
        Ok(())
    }

    pub fn has_features(&self) -> bool {
        !self.features.is_empty()
    }

    pub fn knob_names(&self) -> Vec<&str> {
        self.knobs.iter().map(|k| k.name.as_str()).collect()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    /// Whether another client's re-declaration matches this one.
    ///
    /// Monitors and plugin parameters are advisory and excluded from the
    /// comparison.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.knobs == other.knobs
            && self.features == other.features
            && self.metrics.len() == other.metrics.len()
            && self
                .metrics
                .iter()
                .zip(other.metrics.iter())
                .all(|(a, b)| a.name == b.name && a.value_type == b.value_type)
    }
}

fn two_fields<'a>(
    line: &str,
    rest: &[&'a str],
) -> Result<(&'a str, &'a str), DescriptionError> {
    match (rest.first().copied(), rest.get(1).copied()) {
        (Some(name), Some(ty)) => Ok((name, ty)),
        _ => Err(DescriptionError::TruncatedLine(line.to_string())),
    }
}

#[cfg(test)]
#[path = "description_tests.rs"]
mod tests;
