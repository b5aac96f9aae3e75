// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CSV container primitives shared by the sub-stores.

use crate::error::StorageError;
use agora_core::ApplicationId;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Absolute path of a named container for an application.
pub fn csv_container_path(root: &Path, app_id: &ApplicationId, name: &str) -> PathBuf {
    root.join(app_id.path()).join(format!("{name}.csv"))
}

/// Replace a container atomically: write header + rows to a staging file
/// next to the target, then rename over it. Readers never observe a
/// partially written container, and concurrent writers each use their own
/// staging file so the survivor is one complete table.
pub(crate) fn replace(
    path: &Path,
    header: &[String],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let staging = staging_path(path);
    let result = write_and_rename(path, &staging, header, rows);
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn write_and_rename(
    path: &Path,
    staging: &Path,
    header: &[String],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<(), StorageError> {
    {
        let mut writer =
            csv::Writer::from_path(staging).map_err(|e| StorageError::csv(staging, e))?;
        writer.write_record(header).map_err(|e| StorageError::csv(staging, e))?;
        for row in rows {
            writer.write_record(&row).map_err(|e| StorageError::csv(staging, e))?;
        }
        writer.flush().map_err(|e| StorageError::io(staging, e))?;
    }

    fs::rename(staging, path).map_err(|e| StorageError::io(path, e))
}

/// Read a container's header and rows. `Ok(None)` when the container does
/// not exist: missing data is an empty model, not an error.
pub(crate) fn read(
    path: &Path,
) -> Result<Option<(Vec<String>, Vec<Vec<String>>)>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| StorageError::csv(path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| StorageError::csv(path, e))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::csv(path, e))?;
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(Some((header, rows)))
}

/// Append one row, creating the container with the given header first if it
/// does not exist yet. The write is a single buffered syscall on an
/// append-mode descriptor, so concurrent appenders interleave at row
/// granularity.
pub(crate) fn append(
    path: &Path,
    header: &[String],
    row: &[String],
) -> Result<(), StorageError> {
    if !path.exists() {
        replace(path, header, std::iter::empty())?;
    }

    let file = fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(row).map_err(|e| StorageError::csv(path, e))?;
    writer.flush().map_err(|e| StorageError::io(path, e))
}

/// Remove a container. Missing files are fine.
pub(crate) fn erase(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// A staging name unique to this write, so concurrent replacements never
/// share a half-written file.
fn staging_path(path: &Path) -> PathBuf {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let mut staging = path.as_os_str().to_os_string();
    staging.push(format!(
        ".staging.{}.{}",
        std::process::id(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ));
    PathBuf::from(staging)
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
