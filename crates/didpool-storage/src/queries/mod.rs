// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for each table group.

pub mod call_records;
pub mod dids;
pub mod rotation;
pub mod tenants;

/// Wraps a parse failure of a stored text column as a rusqlite conversion error.
pub(crate) fn text_conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
