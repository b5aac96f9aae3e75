// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application handler status bitmask.

use bitflags::bitflags;

bitflags! {
    /// Facts that can simultaneously hold for one application handler.
    ///
    /// Several bits are routinely set together, e.g.
    /// `WITH_DOE | WITH_CLUSTER | BUILDING_MODEL` while the model plugins
    /// run after exploration finished.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApplicationStatus: u16 {
        const RECOVERING          = 1 << 0;
        const CLUELESS            = 1 << 1;
        const UNDEFINED           = 1 << 2;
        const WITH_INFORMATION    = 1 << 3;
        const EXPLORING           = 1 << 4;
        const BUILDING_DOE        = 1 << 5;
        const WITH_DOE            = 1 << 6;
        const BUILDING_CLUSTER    = 1 << 7;
        const WITH_CLUSTER        = 1 << 8;
        const BUILDING_MODEL      = 1 << 9;
        const WITH_MODEL          = 1 << 10;
        const BUILDING_PREDICTION = 1 << 11;
        const WITH_PREDICTION     = 1 << 12;
    }
}

impl ApplicationStatus {
    /// Labels that describe a handler at rest (no plugin in flight).
    pub const AT_REST: Self = Self::CLUELESS
        .union(Self::WITH_INFORMATION)
        .union(Self::WITH_DOE)
        .union(Self::WITH_CLUSTER)
        .union(Self::WITH_MODEL)
        .union(Self::WITH_PREDICTION);

    /// Labels set while a plugin runs.
    pub const BUILDING: Self = Self::BUILDING_DOE
        .union(Self::BUILDING_CLUSTER)
        .union(Self::BUILDING_MODEL)
        .union(Self::BUILDING_PREDICTION);

    pub fn is_building(&self) -> bool {
        self.intersects(Self::BUILDING)
    }

    /// A well-formed status carries at least one at-rest label unless a
    /// BUILDING_* label (or the transient RECOVERING) is set.
    pub fn is_consistent(&self) -> bool {
        self.intersects(Self::AT_REST)
            || self.is_building()
            || self.contains(Self::RECOVERING)
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::CLUELESS
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            f.write_str("EMPTY")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
