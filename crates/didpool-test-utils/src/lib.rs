// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for didpool integration tests.
//!
//! Provides a mock notifier and a harness that runs the real allocation
//! stack on a throwaway SQLite database.
//!
//! # Components
//!
//! - [`TestHarness`] - store, dispatcher, allocation handler, and router
//! - [`RecordingNotifier`] - notifier that captures alerts

pub mod harness;
pub mod mock_notifier;

pub use harness::{TEST_ADMIN, TEST_API_KEY, TestHarness, TestHarnessBuilder};
pub use mock_notifier::RecordingNotifier;
