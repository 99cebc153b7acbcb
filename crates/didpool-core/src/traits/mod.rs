// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Every adapter extends the [`PluginAdapter`] base trait and uses
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod notify;
pub mod store;
pub mod tenant;

pub use adapter::PluginAdapter;
pub use notify::Notifier;
pub use store::{AllocationStore, CallRecordStore, DidStore, RotationStore};
pub use tenant::{AdminDirectory, TenantResolver};
