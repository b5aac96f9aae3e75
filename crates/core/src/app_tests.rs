// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn round_trips_through_display() {
    let id = ApplicationId::new("swaptions", "kernel", "v2");
    assert_eq!(id.to_string(), "swaptions^kernel^v2");
    assert_eq!(ApplicationId::parse(&id.to_string()).unwrap(), id);
}

#[test]
fn path_form_uses_directories() {
    let id = ApplicationId::new("app", "blk", "1");
    assert_eq!(id.path(), std::path::PathBuf::from("app/blk/1"));
}

#[parameterized(
    empty = { "" },
    missing_version = { "app^blk" },
    extra_segment = { "app^blk^1^extra" },
    empty_block = { "app^^1" },
)]
fn rejects_malformed(input: &str) {
    assert!(ApplicationId::parse(input).is_err());
}

#[test]
fn serde_round_trip() {
    let id = ApplicationId::new("app", "blk", "1");
    let json = serde_json::to_string(&id).unwrap();
    let back: ApplicationId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
