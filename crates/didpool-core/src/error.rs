// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the didpool rotation service.
//!
//! Running out of good DIDs is not an error: the selection cascade degrades
//! and, with zero active DIDs, the caller receives the fallback number. Only
//! store-level failures and lost rotation races surface from here.

use thiserror::Error;

/// The primary error type used across didpool traits and the allocation path.
#[derive(Debug, Error)]
pub enum DidpoolError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The DID, rotation-state, or call-record store could not be read or written.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A conditional rotation-state write found a newer version than the one
    /// the allocation was computed from.
    #[error("rotation state for tenant {tenant_id} was modified concurrently")]
    RotationConflict { tenant_id: String },

    /// The request carried no valid tenant context (missing or unknown API key).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Admin notification could not be delivered.
    #[error("notification error: {message}")]
    Notification {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DidpoolError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DidpoolError::Storage {
            source: Box::new(err),
        }
    }

    /// True for errors a caller may resolve by re-reading state and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DidpoolError::RotationConflict { .. })
    }
}
