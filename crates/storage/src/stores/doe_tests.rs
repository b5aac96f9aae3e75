// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn app() -> ApplicationId {
    ApplicationId::new("app", "blk", "1")
}

fn description() -> BlockDescription {
    BlockDescription::parse("knob threads int32 1 2 4@metric latency float model").unwrap()
}

fn config(threads: &str) -> Configuration {
    let mut c = Configuration::new();
    c.insert("threads".to_string(), threads.to_string());
    c
}

fn plan() -> DoeModel {
    let mut doe = DoeModel::new();
    doe.add_config("cfg1", config("1"), 2);
    doe.add_config("cfg2", config("2"), 1);
    doe.set_total_configurations(2);
    doe
}

#[test]
fn store_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = DoeStore::new(dir.path());

    store.store(&app(), &description(), &plan()).unwrap();
    let loaded = store.load(&app(), &description()).unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get("cfg1").map(|e| e.remaining_explorations), Some(2));
    assert_eq!(loaded.get("cfg2").map(|e| e.configuration.clone()), Some(config("2")));
    assert_eq!(loaded.total_configurations(), 2);
}

#[test]
fn missing_containers_load_as_empty_plan() {
    let dir = TempDir::new().unwrap();
    let store = DoeStore::new(dir.path());
    let loaded = store.load(&app(), &description()).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.total_configurations(), 0);
}

#[test]
fn consumed_rows_disappear_from_storage() {
    let dir = TempDir::new().unwrap();
    let store = DoeStore::new(dir.path());
    let mut doe = plan();

    doe.update_config("cfg2");
    store.store(&app(), &description(), &doe).unwrap();

    let loaded = store.load(&app(), &description()).unwrap();
    assert!(loaded.get("cfg2").is_none());
    // the total survives consumption for the prediction plugin
    assert_eq!(loaded.total_configurations(), 2);
}

#[test]
fn mismatched_knob_columns_are_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = DoeStore::new(dir.path());
    store.store(&app(), &description(), &plan()).unwrap();

    let other = BlockDescription::parse("knob cores int32 1 2@metric latency float model").unwrap();
    assert!(matches!(
        store.load(&app(), &other),
        Err(StorageError::Corrupt { .. })
    ));
}

#[test]
fn erase_removes_both_containers() {
    let dir = TempDir::new().unwrap();
    let store = DoeStore::new(dir.path());
    store.store(&app(), &description(), &plan()).unwrap();

    store.erase(&app()).unwrap();

    assert!(store.load(&app(), &description()).unwrap().is_empty());
    assert_eq!(store.load_total(&app()).unwrap(), 0);
}
