// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cycle manager: when to start a fresh round-robin pass.

use chrono::{DateTime, Duration, Utc};
use didpool_core::types::{DidId, RotationState};
use tracing::info;

/// Decides and applies rotation cycle resets.
#[derive(Debug, Clone, Copy)]
pub struct CycleManager {
    max_age: Duration,
}

impl CycleManager {
    pub fn new(max_age: std::time::Duration) -> Self {
        Self {
            max_age: Duration::from_std(max_age).unwrap_or(Duration::MAX),
        }
    }

    /// True once every eligible DID has been used this cycle, or the cycle is
    /// older than the max age.
    pub fn should_reset(&self, state: &RotationState, eligible: usize, now: DateTime<Utc>) -> bool {
        state.used_dids_in_cycle.len() >= eligible || now - state.last_reset > self.max_age
    }

    /// Returns `state` with a fresh cycle started at `now`, keeping its version.
    pub fn reset(&self, state: &RotationState, now: DateTime<Utc>) -> RotationState {
        info!(
            used_in_cycle = state.used_dids_in_cycle.len(),
            last_reset = %state.last_reset,
            "resetting rotation cycle"
        );
        RotationState {
            current_index: 0,
            last_reset: now,
            used_dids_in_cycle: Default::default(),
            version: state.version,
        }
    }

    /// Marks `did` as used and advances the diagnostic index modulo `eligible`.
    pub fn advance(&self, state: &mut RotationState, did: &DidId, eligible: usize) {
        state.used_dids_in_cycle.insert(did.clone());
        state.current_index = match u32::try_from(eligible) {
            Ok(0) | Err(_) => 0,
            Ok(n) => (state.current_index % n + 1) % n,
        };
    }
}

impl Default for CycleManager {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(24 * 60 * 60))
    }
}
