// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DID rotation and selection engine.
//!
//! This crate provides:
//! - **Capacity gate**: pure per-DID daily cap check
//! - **Candidate selector**: the four-strategy cascade over a tenant's pool
//! - **Cycle manager**: round-robin cycle reset and advance
//! - **Usage recorder**: atomic usage + rotation commit, queued call records
//! - **Allocation handler**: per-tenant serialized orchestration with a TTL
//!   state cache and conflict retry
//! - **Dispatcher**: background worker for call records and admin alerts

pub mod allocator;
pub mod cache;
pub mod capacity;
pub mod cycle;
pub mod dispatch;
pub mod locks;
pub mod recorder;
pub mod selector;

pub use allocator::{Allocation, AllocationHandler, AllocationOutcome, state_cache};
pub use cache::{NoStateCache, RotationStateCache, TtlStateCache};
pub use capacity::{effective_capacity, has_capacity, local_today, today_usage};
pub use cycle::CycleManager;
pub use dispatch::{DispatchSettings, DispatchTargets, Dispatcher, DispatchWorker, SideEffect};
pub use locks::TenantLocks;
pub use recorder::UsageRecorder;
pub use selector::{CandidateSelector, PoolStats, Selection, SelectionPolicy, Strategy};
