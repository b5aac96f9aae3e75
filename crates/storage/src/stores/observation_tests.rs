// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn app() -> ApplicationId {
    ApplicationId::new("app", "blk", "1")
}

fn description() -> BlockDescription {
    BlockDescription::parse(
        "knob threads int32 1 2 4@feature size int32 le@metric latency float model",
    )
    .unwrap()
}

fn observation(size: &str, threads: &str, latency: &str) -> Observation {
    Observation::parse(
        &format!("size={size}@threads={threads}@latency={latency}"),
        &description(),
    )
    .unwrap()
}

#[test]
fn create_table_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let store = ObservationStore::new(dir.path());
    store.create_table(&app(), &description()).unwrap();

    assert_eq!(store.count(&app()).unwrap(), 0);
    let content =
        std::fs::read_to_string(store.get_observation_name(&app())).unwrap();
    assert!(content.starts_with("client_id,sec,nanosec,size,threads,latency"));
}

#[test]
fn inserts_append_rows_in_declaration_order() {
    let dir = TempDir::new().unwrap();
    let store = ObservationStore::new(dir.path());
    store.create_table(&app(), &description()).unwrap();

    store
        .insert(&app(), &description(), "c1", 10, 500, &observation("10", "2", "8.1"))
        .unwrap();
    store
        .insert(&app(), &description(), "c2", 11, 0, &observation("1000", "4", "3.0"))
        .unwrap();

    assert_eq!(store.count(&app()).unwrap(), 2);
    let content =
        std::fs::read_to_string(store.get_observation_name(&app())).unwrap();
    assert!(content.contains("c1,10,500,10,2,8.1"));
    assert!(content.contains("c2,11,0,1000,4,3.0"));
}

#[test]
fn insert_without_create_still_writes_header() {
    let dir = TempDir::new().unwrap();
    let store = ObservationStore::new(dir.path());

    store
        .insert(&app(), &description(), "c1", 1, 2, &observation("10", "1", "5"))
        .unwrap();

    assert_eq!(store.count(&app()).unwrap(), 1);
}

#[test]
fn erase_drops_the_trace() {
    let dir = TempDir::new().unwrap();
    let store = ObservationStore::new(dir.path());
    store.create_table(&app(), &description()).unwrap();
    store.erase(&app()).unwrap();
    assert_eq!(store.count(&app()).unwrap(), 0);
}
