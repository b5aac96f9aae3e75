// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Design-of-experiments model: the configurations the server still wants
//! the fleet to measure.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Knob name → string-encoded value.
pub type Configuration = BTreeMap<String, String>;

/// One row of the exploration plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoeEntry {
    pub configuration: Configuration,
    pub remaining_explorations: u32,
}

/// The exploration plan produced by the DoE plugin.
///
/// Insertion-ordered so the round-robin cursor walks rows in a stable order.
/// Rows whose remaining-exploration counter reaches zero are removed; the
/// cursor survives removal of the row it points at by moving to the
/// successor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoeModel {
    required_explorations: IndexMap<String, DoeEntry>,
    /// Total number of configurations the DoE plugin produced, persisted for
    /// the prediction plugin. Stays fixed while rows are consumed.
    total_configurations: u32,
    /// Round-robin cursor: the configuration id served next. `None` both for
    /// an empty plan and before the first dispatch.
    next: Option<String>,
}

impl DoeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration to the plan. Rows with zero required explorations
    /// are not representable and are dropped on the floor.
    pub fn add_config(
        &mut self,
        configuration_id: impl Into<String>,
        configuration: Configuration,
        remaining_explorations: u32,
    ) {
        if remaining_explorations == 0 {
            return;
        }
        self.required_explorations.insert(
            configuration_id.into(),
            DoeEntry { configuration, remaining_explorations },
        );
    }

    pub fn set_total_configurations(&mut self, total: u32) {
        self.total_configurations = total;
    }

    pub fn total_configurations(&self) -> u32 {
        self.total_configurations
    }

    pub fn is_empty(&self) -> bool {
        self.required_explorations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.required_explorations.len()
    }

    /// Sum of the remaining exploration counters across surviving rows.
    pub fn remaining_total(&self) -> u32 {
        self.required_explorations.values().map(|e| e.remaining_explorations).sum()
    }

    pub fn get(&self, configuration_id: &str) -> Option<&DoeEntry> {
        self.required_explorations.get(configuration_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DoeEntry)> {
        self.required_explorations.iter()
    }

    /// Id of the row whose configuration equals `configuration`, if any.
    pub fn find_configuration(&self, configuration: &Configuration) -> Option<&str> {
        self.required_explorations
            .iter()
            .find(|(_, entry)| &entry.configuration == configuration)
            .map(|(id, _)| id.as_str())
    }

    /// The configuration id the cursor currently points at.
    pub fn cursor(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Serve the next configuration in round-robin order and advance the
    /// cursor. Returns `None` only when the plan is empty.
    pub fn get_next(&mut self) -> Option<(String, Configuration)> {
        if self.required_explorations.is_empty() {
            self.next = None;
            return None;
        }

        let current = self.cursor_index();
        let (id, entry) = self
            .required_explorations
            .get_index(current)
            .map(|(id, entry)| (id.clone(), entry.configuration.clone()))?;

        let successor = (current + 1) % self.required_explorations.len();
        self.next = self
            .required_explorations
            .get_index(successor)
            .map(|(next_id, _)| next_id.clone());

        Some((id, entry))
    }

    /// Consume one exploration of `configuration_id`: decrement the counter
    /// and remove the row when it reaches zero, moving the cursor to the
    /// successor if it pointed at the removed row. Returns `false` if the id
    /// is not part of the plan.
    pub fn update_config(&mut self, configuration_id: &str) -> bool {
        let Some(index) = self.required_explorations.get_index_of(configuration_id) else {
            return false;
        };

        let exhausted = {
            let Some((_, entry)) = self.required_explorations.get_index_mut(index) else {
                return false;
            };
            entry.remaining_explorations -= 1;
            entry.remaining_explorations == 0
        };

        if exhausted {
            // shift_remove keeps insertion order so the successor is the row
            // that lands on the removed index
            self.required_explorations.shift_remove_index(index);

            if self.required_explorations.is_empty() {
                self.next = None;
            } else if self.next.as_deref() == Some(configuration_id) {
                let successor = index % self.required_explorations.len();
                self.next = self
                    .required_explorations
                    .get_index(successor)
                    .map(|(id, _)| id.clone());
            }
        }

        true
    }

    pub fn clear(&mut self) {
        self.required_explorations.clear();
        self.next = None;
        self.total_configurations = 0;
    }

    fn cursor_index(&self) -> usize {
        self.next
            .as_deref()
            .and_then(|id| self.required_explorations.get_index_of(id))
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "doe_tests.rs"]
mod tests;
