// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The zone lifecycle state machine.

use serde::{Deserialize, Serialize};

/// A zone's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Locked,
    Frozen,
    Aborting,
}

impl ZoneState {
    /// True iff state ∈ {RUNNING, LOCKED}.
    pub fn is_running(self) -> bool {
        matches!(self, ZoneState::Running | ZoneState::Locked)
    }
}

crate::simple_display! {
    ZoneState {
        Stopped => "stopped",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Locked => "locked",
        Frozen => "frozen",
        Aborting => "aborting",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_running_matches_running_and_locked_only() {
        assert!(ZoneState::Running.is_running());
        assert!(ZoneState::Locked.is_running());
        for s in [
            ZoneState::Stopped,
            ZoneState::Starting,
            ZoneState::Stopping,
            ZoneState::Frozen,
            ZoneState::Aborting,
        ] {
            assert!(!s.is_running(), "{s} should not be considered running");
        }
    }
}
