// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_is_clueless() {
    assert_eq!(ApplicationStatus::default(), ApplicationStatus::CLUELESS);
}

#[test]
fn combined_facts_hold_simultaneously() {
    let status = ApplicationStatus::WITH_DOE
        | ApplicationStatus::WITH_CLUSTER
        | ApplicationStatus::BUILDING_MODEL;

    assert!(status.contains(ApplicationStatus::WITH_DOE));
    assert!(status.contains(ApplicationStatus::WITH_CLUSTER));
    assert!(status.is_building());
    assert!(status.is_consistent());
}

#[test]
fn building_alone_is_consistent() {
    assert!(ApplicationStatus::BUILDING_DOE.is_consistent());
    assert!(ApplicationStatus::RECOVERING.is_consistent());
}

#[test]
fn exploring_alone_is_not_at_rest() {
    // EXPLORING without WITH_DOE violates the at-rest invariant
    assert!(!ApplicationStatus::EXPLORING.is_consistent());
    assert!((ApplicationStatus::EXPLORING | ApplicationStatus::WITH_DOE).is_consistent());
}

#[test]
fn display_joins_label_names() {
    let status = ApplicationStatus::WITH_DOE | ApplicationStatus::EXPLORING;
    let text = status.to_string();
    assert!(text.contains("WITH_DOE"));
    assert!(text.contains("EXPLORING"));
    assert!(text.contains('|'));
}

#[test]
fn empty_status_displays_as_empty() {
    assert_eq!(ApplicationStatus::empty().to_string(), "EMPTY");
    assert!(!ApplicationStatus::empty().is_consistent());
}
