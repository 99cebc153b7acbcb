// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capacity gate: per-DID daily call ceilings.
//!
//! Pure functions over a [`Did`] and a calendar date. Usage is bucketed by
//! the server's local calendar day, so a DID's usage drops to zero the moment
//! the date rolls over, independent of the rotation cycle timer.

use chrono::{Local, NaiveDate};
use didpool_core::types::Did;

/// The server's current local calendar date.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Calls placed through `did` on `today`, or 0 if it has no entry for that date.
pub fn today_usage(did: &Did, today: NaiveDate) -> u32 {
    did.usage
        .daily
        .iter()
        .find(|entry| entry.date == today)
        .map_or(0, |entry| entry.count)
}

/// The DID's own capacity if set, else `default_capacity`.
pub fn effective_capacity(did: &Did, default_capacity: u32) -> u32 {
    did.capacity.unwrap_or(default_capacity)
}

/// True iff today's usage is strictly below the effective capacity.
pub fn has_capacity(did: &Did, today: NaiveDate, default_capacity: u32) -> bool {
    today_usage(did, today) < effective_capacity(did, default_capacity)
}
