// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application identity

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Identity of a managed application: `(name, block, version)`.
///
/// The canonical string form is `name^block^version` (the form clients put in
/// topics); the filesystem form is `name/block/version` (the per-application
/// directory under the storage and workspace roots).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId {
    pub name: String,
    pub block: String,
    pub version: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid application id '{input}': expected name^block^version")]
pub struct ParseIdError {
    pub input: String,
}

impl ApplicationId {
    pub fn new(
        name: impl Into<String>,
        block: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), block: block.into(), version: version.into() }
    }

    /// Parse the `name^block^version` topic segment.
    pub fn parse(s: &str) -> Result<Self, ParseIdError> {
        let mut parts = s.split('^');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(block), Some(version), None)
                if !name.is_empty() && !block.is_empty() && !version.is_empty() =>
            {
                Ok(Self::new(name, block, version))
            }
            _ => Err(ParseIdError { input: s.to_string() }),
        }
    }

    /// Relative directory for this application under a storage/workspace root.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.name).join(&self.block).join(&self.version)
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}^{}^{}", self.name, self.block, self.version)
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
