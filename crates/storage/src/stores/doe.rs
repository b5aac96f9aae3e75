// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DoE store: the exploration plan plus the total-configurations counter.

use crate::container;
use crate::error::StorageError;
use agora_core::{ApplicationId, BlockDescription, Configuration, DoeModel};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DoeStore {
    root: PathBuf,
}

impl DoeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn get_type(&self) -> &'static str {
        "csv"
    }

    pub fn get_doe_name(&self, app_id: &ApplicationId) -> String {
        container::csv_container_path(&self.root, app_id, "doe").display().to_string()
    }

    pub fn get_total_configurations_name(&self, app_id: &ApplicationId) -> String {
        container::csv_container_path(&self.root, app_id, "total_configurations")
            .display()
            .to_string()
    }

    /// Replace both doe containers. Called after every consumed exploration,
    /// so a restart resumes with the surviving counters.
    pub fn store(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
        doe: &DoeModel,
    ) -> Result<(), StorageError> {
        let mut header = vec!["config_id".to_string()];
        header.extend(description.knob_names().iter().map(|n| n.to_string()));
        header.push("counter".to_string());

        let rows = doe.iter().map(|(id, entry)| {
            let mut row = vec![id.clone()];
            row.extend(
                description
                    .knobs
                    .iter()
                    .map(|k| entry.configuration.get(&k.name).cloned().unwrap_or_default()),
            );
            row.push(entry.remaining_explorations.to_string());
            row
        });
        container::replace(Path::new(&self.get_doe_name(app_id)), &header, rows)?;

        container::replace(
            Path::new(&self.get_total_configurations_name(app_id)),
            &["total_configurations".to_string()],
            vec![vec![doe.total_configurations().to_string()]],
        )
    }

    /// Load the plan the DoE plugin (or a previous run) left behind. A
    /// missing container is an empty plan.
    pub fn load(
        &self,
        app_id: &ApplicationId,
        description: &BlockDescription,
    ) -> Result<DoeModel, StorageError> {
        let mut doe = DoeModel::new();
        let path = self.get_doe_name(app_id);

        if let Some((header, rows)) = container::read(Path::new(&path))? {
            if header.len() < 2 {
                return Err(StorageError::corrupt(&path, "doe header too short"));
            }
            let knob_names = &header[1..header.len() - 1];

            let mut declared: Vec<&str> = description.knob_names();
            let mut stored: Vec<&str> = knob_names.iter().map(String::as_str).collect();
            declared.sort_unstable();
            stored.sort_unstable();
            if !declared.is_empty() && declared != stored {
                return Err(StorageError::corrupt(&path, "knob columns do not match description"));
            }

            for row in rows {
                if row.len() != header.len() {
                    return Err(StorageError::corrupt(&path, "doe row width mismatch"));
                }
                let mut fields = row.into_iter();
                let Some(config_id) = fields.next() else { continue };

                let mut configuration = Configuration::new();
                for name in knob_names {
                    if let Some(value) = fields.next() {
                        configuration.insert(name.clone(), value);
                    }
                }
                let counter: u32 = fields
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| StorageError::corrupt(&path, "bad counter"))?;

                doe.add_config(config_id, configuration, counter);
            }
        }

        doe.set_total_configurations(self.load_total(app_id)?);
        Ok(doe)
    }

    /// The persisted total-configurations counter, zero when never stored.
    pub fn load_total(&self, app_id: &ApplicationId) -> Result<u32, StorageError> {
        let path = self.get_total_configurations_name(app_id);
        let Some((_, rows)) = container::read(Path::new(&path))? else {
            return Ok(0);
        };
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    pub fn erase(&self, app_id: &ApplicationId) -> Result<(), StorageError> {
        container::erase(Path::new(&self.get_doe_name(app_id)))?;
        container::erase(Path::new(&self.get_total_configurations_name(app_id)))
    }
}

#[cfg(test)]
#[path = "doe_tests.rs"]
mod tests;
