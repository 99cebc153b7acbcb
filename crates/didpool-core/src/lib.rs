// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the didpool caller-ID rotation service.
//!
//! This crate provides the domain types (DIDs, rotation state, call records),
//! the error taxonomy, and the collaborator traits that the storage, tenant
//! directory, and notification adapters implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::DidpoolError;
pub use types::{AdapterType, DidId, HealthStatus, TenantId};

pub use traits::{
    AdminDirectory, AllocationStore, CallRecordStore, DidStore, Notifier, PluginAdapter,
    RotationStore, TenantResolver,
};
