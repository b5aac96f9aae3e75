// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn config(threads: &str) -> Configuration {
    let mut c = Configuration::new();
    c.insert("threads".to_string(), threads.to_string());
    c
}

fn plan() -> DoeModel {
    let mut doe = DoeModel::new();
    doe.add_config("cfg1", config("1"), 2);
    doe.add_config("cfg2", config("2"), 2);
    doe.add_config("cfg3", config("4"), 2);
    doe.set_total_configurations(3);
    doe
}

#[test]
fn round_robin_walks_rows_in_order() {
    let mut doe = plan();
    let served: Vec<String> = (0..6).filter_map(|_| doe.get_next().map(|(id, _)| id)).collect();
    assert_eq!(served, ["cfg1", "cfg2", "cfg3", "cfg1", "cfg2", "cfg3"]);
}

#[test]
fn zero_remaining_rows_are_not_added() {
    let mut doe = DoeModel::new();
    doe.add_config("cfg1", config("1"), 0);
    assert!(doe.is_empty());
}

#[test]
fn update_decrements_and_removes_at_zero() {
    let mut doe = plan();
    assert!(doe.update_config("cfg1"));
    assert_eq!(doe.get("cfg1").map(|e| e.remaining_explorations), Some(1));

    assert!(doe.update_config("cfg1"));
    assert!(doe.get("cfg1").is_none());
    assert_eq!(doe.len(), 2);
}

#[test]
fn update_of_unknown_id_is_rejected() {
    let mut doe = plan();
    assert!(!doe.update_config("cfg9"));
    assert_eq!(doe.len(), 3);
}

#[test]
fn cursor_moves_to_successor_when_its_row_is_removed() {
    let mut doe = plan();
    // advance cursor onto cfg2
    let _ = doe.get_next();
    assert_eq!(doe.cursor(), Some("cfg2"));

    doe.update_config("cfg2");
    doe.update_config("cfg2");
    assert_eq!(doe.cursor(), Some("cfg3"));

    let (id, _) = doe.get_next().unwrap();
    assert_eq!(id, "cfg3");
}

#[test]
fn cursor_wraps_when_last_row_is_removed() {
    let mut doe = plan();
    // cursor onto cfg3
    let _ = doe.get_next();
    let _ = doe.get_next();
    assert_eq!(doe.cursor(), Some("cfg3"));

    doe.update_config("cfg3");
    doe.update_config("cfg3");
    assert_eq!(doe.cursor(), Some("cfg1"));
}

#[test]
fn exhausting_the_plan_clears_the_cursor() {
    let mut doe = plan();
    for id in ["cfg1", "cfg2", "cfg3"] {
        doe.update_config(id);
        doe.update_config(id);
    }
    assert!(doe.is_empty());
    assert!(doe.cursor().is_none());
    assert!(doe.get_next().is_none());
    // the total survives row consumption
    assert_eq!(doe.total_configurations(), 3);
}

#[test]
fn find_configuration_matches_by_value() {
    let doe = plan();
    assert_eq!(doe.find_configuration(&config("2")), Some("cfg2"));
    assert_eq!(doe.find_configuration(&config("16")), None);
}

proptest! {
    /// Invariant: after any interleaving of dispatch and consumption, the
    /// cursor either is unset or points at a surviving row, and every
    /// surviving row has a positive counter.
    #[test]
    fn cursor_always_points_at_a_live_row(ops in proptest::collection::vec(0u8..4, 1..64)) {
        let mut doe = plan();
        for op in ops {
            match op {
                0 => { let _ = doe.get_next(); }
                _ => {
                    let id = doe.iter().nth(op as usize % doe.len().max(1)).map(|(id, _)| id.clone());
                    if let Some(id) = id {
                        doe.update_config(&id);
                    }
                }
            }

            if let Some(cursor) = doe.cursor() {
                let entry = doe.get(cursor);
                prop_assert!(entry.is_some());
            }
            for (_, entry) in doe.iter() {
                prop_assert!(entry.remaining_explorations > 0);
            }
        }
    }
}
